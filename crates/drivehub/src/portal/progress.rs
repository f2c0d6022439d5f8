use chrono::NaiveDateTime;

use super::domain::PackageInstance;

/// Clamp the completed lesson count into `0..=lesson_count` and flip the package to
/// driver ready once every lesson is done. An existing `driver_ready_at` is kept.
pub fn update_lesson_progress(
    mut package: PackageInstance,
    lessons_completed: i64,
    now: NaiveDateTime,
) -> PackageInstance {
    let clamped = lessons_completed.clamp(0, i64::from(package.lesson_count));
    package.lessons_completed = u32::try_from(clamped).unwrap_or(package.lesson_count);

    if package.lessons_completed == package.lesson_count {
        package.is_driver_ready = true;
        if package.driver_ready_at.is_none() {
            package.driver_ready_at = Some(now);
        }
    }
    package
}

pub fn mark_package_complete(mut package: PackageInstance, now: NaiveDateTime) -> PackageInstance {
    package.lessons_completed = package.lesson_count;
    package.is_driver_ready = true;
    package.driver_ready_at = Some(now);
    package
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::portal::domain::{PackageDraft, PackageId, PackageType, UserId};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .and_then(|date| date.and_hms_opt(hour, 0, 0))
            .expect("valid timestamp")
    }

    fn learners() -> PackageInstance {
        PackageDraft {
            package_type: PackageType::Learners,
            display_name: "Learners Package".to_string(),
            lesson_count: 20,
            price: 500,
            student_id: UserId("usr-progress".to_string()),
        }
        .into_instance(PackageId(3))
    }

    #[test]
    fn partial_progress_is_not_driver_ready() {
        let package = update_lesson_progress(learners(), 12, at(9));
        assert_eq!(package.lessons_completed, 12);
        assert!(!package.is_driver_ready);
        assert!(package.driver_ready_at.is_none());
        assert_eq!(package.progress_percentage(), 60);
    }

    #[test]
    fn clamps_into_lesson_range() {
        let over = update_lesson_progress(learners(), 20 + 50, at(9));
        assert_eq!(over.lessons_completed, 20);
        assert!(over.is_driver_ready);
        assert_eq!(over.driver_ready_at, Some(at(9)));

        let under = update_lesson_progress(learners(), -4, at(9));
        assert_eq!(under.lessons_completed, 0);
        assert!(!under.is_driver_ready);
    }

    #[test]
    fn repeated_completion_keeps_first_stamp() {
        let first = update_lesson_progress(learners(), 20, at(9));
        let again = update_lesson_progress(first, 20, at(9) + Duration::hours(3));
        assert_eq!(again.driver_ready_at, Some(at(9)));
    }

    #[test]
    fn mark_complete_always_restamps() {
        let first = update_lesson_progress(learners(), 20, at(9));
        let marked = mark_package_complete(first, at(15));
        assert_eq!(marked.lessons_completed, 20);
        assert!(marked.is_driver_ready);
        assert_eq!(marked.driver_ready_at, Some(at(15)));
    }
}
