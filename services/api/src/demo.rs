use crate::infra::InMemoryPortalStore;
use chrono::{Datelike, Duration, Local};
use clap::Args;
use drivehub::config::NotificationConfig;
use drivehub::error::AppError;
use drivehub::notifications::OutboxNotifier;
use drivehub::portal::{
    BookingEligibility, BookingRequest, EligibilityConfig, PackageId, PackageType,
    PaymentDetails, PaymentResult, PortalService, PortalServiceError, RegistrationRequest,
    SelectionResult, UserAccount, UserDirectory, UserId, UserRole,
};
use std::sync::Arc;

type DemoService = PortalService<InMemoryPortalStore, OutboxNotifier>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Identity number used for the demo student.
    #[arg(long, default_value = "0001010000080")]
    pub(crate) identity_number: String,
    /// Package type to upgrade to once learners is complete.
    #[arg(long, value_enum, default_value_t = UpgradeChoice::Code8)]
    pub(crate) upgrade: UpgradeChoice,
    /// Stop after the upgrade payment instead of requesting a test vehicle.
    #[arg(long)]
    pub(crate) skip_booking: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub(crate) enum UpgradeChoice {
    Code8,
    Code10,
}

impl UpgradeChoice {
    fn package_type(self) -> PackageType {
        match self {
            UpgradeChoice::Code8 => PackageType::DriversCode8,
            UpgradeChoice::Code10 => PackageType::DriversCode10,
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryPortalStore::default());
    let notifier = Arc::new(OutboxNotifier::new(&NotificationConfig::default()));
    let service = PortalService::new(
        store.clone(),
        notifier.clone(),
        EligibilityConfig::default(),
    );

    let instructor = store
        .insert_user(demo_instructor())
        .map_err(PortalServiceError::from)?;

    println!("DriveHub portal demo");
    let identity = service.lookup_identity(&args.identity_number)?;
    println!(
        "Identity {} -> born {}, age {}",
        args.identity_number, identity.birth_date, identity.age
    );

    let student = match service.register_student(RegistrationRequest {
        full_name: "Lindiwe Nkosi".to_string(),
        email: "lindiwe@example.com".to_string(),
        phone_number: "0821234567".to_string(),
        identity_number: args.identity_number.clone(),
        address: "3 Loop Street, Cape Town".to_string(),
    }) {
        Ok(student) => student,
        Err(err) => {
            println!("  Registration refused: {err}");
            return Ok(());
        }
    };
    println!("Registered student {} ({})", student.full_name, student.id);

    service.assign_instructor(&student.id, &instructor.id)?;
    println!("Assigned instructor {}", instructor.full_name);

    println!("\nLearners stage");
    let Some(learners) = select_and_pay(&service, &student.id, 1)? else {
        return Ok(());
    };
    service.mark_package_complete(&instructor.id, learners)?;
    println!("  Instructor marked learners complete");

    let upgrade_type = args.upgrade.package_type();
    println!("\nUpgrade stage");
    match service.offered_packages(&student.id, true) {
        Ok(offer) => {
            let names: Vec<_> = offer
                .templates
                .iter()
                .map(|template| template.display_name)
                .collect();
            println!("  Upgrade offers: {}", names.join(", "));
            match offer
                .templates
                .iter()
                .find(|template| template.package_type == upgrade_type)
            {
                Some(template) => {
                    if let Some(upgrade) = select_and_pay(&service, &student.id, template.id)? {
                        let updated =
                            service.update_lesson_progress(&instructor.id, upgrade, 30)?;
                        println!(
                            "  Lessons {}/{} (driver ready: {})",
                            updated.lessons_completed, updated.lesson_count, updated.is_driver_ready
                        );
                    }
                }
                None => println!("  {} is not on offer", upgrade_type.label()),
            }
        }
        Err(err) => println!("  Upgrade unavailable: {err}"),
    }

    if !args.skip_booking {
        println!("\nVehicle booking");
        match service.check_booking_eligibility(&student.id)? {
            BookingEligibility::Eligible => {
                let booking = service.book_vehicle(
                    &student.id,
                    BookingRequest {
                        test_date: Local::now().date_naive() + Duration::days(21),
                        test_location: "Milnerton DLTC".to_string(),
                        vehicle_type: "Manual hatchback".to_string(),
                        special_requirements: None,
                    },
                )?;
                println!(
                    "  Booked {} at {} (fee R{}, {})",
                    booking.test_date,
                    booking.test_location,
                    booking.booking_fee,
                    booking.status.label()
                );
            }
            BookingEligibility::Ineligible(reason) => {
                println!("  Not eligible: {}", reason.summary())
            }
        }
    }

    let overview = service.admin_overview()?;
    match serde_json::to_string_pretty(&overview) {
        Ok(json) => println!("\nAdmin overview:\n{json}"),
        Err(err) => println!("\nAdmin overview unavailable: {err}"),
    }

    println!("\nOutbox");
    for record in notifier.outbox() {
        println!("  [{:?}] {} -> {}", record.kind, record.subject, record.to);
    }

    Ok(())
}

/// Select a template and pay for the resulting package. `None` when the selection was refused.
fn select_and_pay(
    service: &DemoService,
    student_id: &UserId,
    template_id: u32,
) -> Result<Option<PackageId>, AppError> {
    let package_id = match service.select_package(student_id, template_id)? {
        SelectionResult::Created { package } => {
            println!(
                "  Selected {} (R{}, {} lessons)",
                package.display_name, package.price, package.lesson_count
            );
            package.id
        }
        SelectionResult::RedirectToPayment { package_id } => {
            println!("  Package {package_id} already held, continuing to payment");
            package_id
        }
        SelectionResult::Rejected { message, .. } => {
            println!("  Selection refused: {message}");
            return Ok(None);
        }
    };

    match service.pay_for_package(student_id, package_id, &demo_card())? {
        PaymentResult::Paid { receipt } => println!(
            "  Paid R{} with card ending {} (receipt {})",
            receipt.amount, receipt.last4_digits, receipt.receipt_number
        ),
        PaymentResult::Rejected { message, .. } => println!("  Payment skipped: {message}"),
    }
    Ok(Some(package_id))
}

fn demo_instructor() -> UserAccount {
    UserAccount {
        id: UserId("inst-demo".to_string()),
        role: UserRole::Instructor,
        full_name: "Sipho Dlamini".to_string(),
        email: "sipho@drivehub.co.za".to_string(),
        phone_number: Some("0731234567".to_string()),
        identity_number: None,
        date_of_birth: None,
        address: "DriveHub Milnerton".to_string(),
        assigned_instructor_id: None,
    }
}

fn demo_card() -> PaymentDetails {
    PaymentDetails {
        card_holder_name: "L Nkosi".to_string(),
        card_number: "4111111111111111".to_string(),
        expiry_month: 12,
        expiry_year: Local::now().year() + 3,
        cvv: "123".to_string(),
    }
}
