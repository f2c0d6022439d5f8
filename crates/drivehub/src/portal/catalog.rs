use super::domain::{PackageTemplate, PackageType};

const STANDARD_TEMPLATES: [PackageTemplate; 5] = [
    PackageTemplate {
        id: 1,
        package_type: PackageType::Learners,
        display_name: "Learners Package",
        lesson_count: 20,
        price: 500,
    },
    PackageTemplate {
        id: 2,
        package_type: PackageType::DriversCode8,
        display_name: "Drivers Package - Code 8",
        lesson_count: 30,
        price: 2000,
    },
    PackageTemplate {
        id: 3,
        package_type: PackageType::DriversCode10,
        display_name: "Drivers Package - Code 10",
        lesson_count: 30,
        price: 3000,
    },
    PackageTemplate {
        id: 4,
        package_type: PackageType::FullCode8,
        display_name: "Full Package - Learners + Code 8",
        lesson_count: 50,
        price: 2000,
    },
    PackageTemplate {
        id: 5,
        package_type: PackageType::FullCode10,
        display_name: "Full Package - Learners + Code 10",
        lesson_count: 50,
        price: 2500,
    },
];

/// Fixed catalog of lesson bundles, ids 1 through 5.
#[derive(Debug, Clone, Copy)]
pub struct PackageCatalog {
    templates: &'static [PackageTemplate],
}

impl Default for PackageCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl PackageCatalog {
    pub fn standard() -> Self {
        Self {
            templates: &STANDARD_TEMPLATES,
        }
    }

    pub fn templates(&self) -> &'static [PackageTemplate] {
        self.templates
    }

    pub fn get(&self, id: u32) -> Option<&'static PackageTemplate> {
        self.templates.iter().find(|template| template.id == id)
    }

    pub fn for_type(&self, package_type: PackageType) -> Option<&'static PackageTemplate> {
        self.templates
            .iter()
            .find(|template| template.package_type == package_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_lists_five_templates_in_id_order() {
        let catalog = PackageCatalog::standard();
        let ids: Vec<u32> = catalog.templates().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let learners = catalog.get(1).expect("learners template");
        assert_eq!(learners.package_type, PackageType::Learners);
        assert_eq!(learners.lesson_count, 20);
        assert_eq!(learners.price, 500);

        let full_code10 = catalog.get(5).expect("full code 10 template");
        assert_eq!(full_code10.display_name, "Full Package - Learners + Code 10");
        assert_eq!(full_code10.price, 2500);
    }

    #[test]
    fn only_learners_is_open_to_minors() {
        let catalog = PackageCatalog::standard();
        for template in catalog.templates() {
            assert_eq!(template.package_type.requires_adult(), template.id != 1);
        }
        assert!(catalog.get(0).is_none());
        assert!(catalog.get(6).is_none());
    }
}
