use anyhow::Result;

/// App Store storefronts offered for selection: (display name, country code).
const COUNTRIES: &[(&str, &str)] = &[
    ("United States", "us"),
    ("Taiwan", "tw"),
    ("United Kingdom", "gb"),
    ("Vietnam", "vn"),
    ("United Arab Emirates", "ae"),
    ("Ukraine", "ua"),
    ("Turkey", "tr"),
    ("Thailand", "th"),
    ("Sweden", "se"),
    ("Spain", "es"),
    ("Australia", "au"),
    ("Brazil", "br"),
    ("Canada", "ca"),
    ("Czech Republic", "cz"),
    ("Denmark", "dk"),
    ("France", "fr"),
    ("Germany", "de"),
    ("Italy", "it"),
    ("Malaysia", "my"),
    ("Japan", "jp"),
    ("Mexico", "mx"),
    ("Netherlands", "nl"),
    ("Norway", "no"),
    ("Poland", "pl"),
    ("Russia", "ru"),
    ("Saudi Arabia", "sa"),
    ("Switzerland", "ch"),
    ("Romania", "ro"),
    ("Hungary", "hu"),
    ("China", "cn"),
    ("Croatia", "hr"),
    ("Finland", "fi"),
    ("Greece", "gr"),
    ("Israel", "il"),
    ("Indonesia", "id"),
    ("Hong Kong", "hk"),
    ("Portugal", "pt"),
    ("Slovakia", "sk"),
    ("Slovenia", "si"),
    ("South Korea", "kr"),
];

/// iOS "Games" subgenres: (display name, App Store genre id).
const CATEGORIES: &[(&str, &str)] = &[
    ("Action", "7001"),
    ("Adventure", "7002"),
    ("Casual", "7003"),
    ("Board", "7004"),
    ("Card", "7005"),
    ("Casino", "7006"),
    ("Family", "7009"),
    ("Music", "7011"),
    ("Puzzle", "7012"),
    ("Racing", "7013"),
    ("Role Playing", "7014"),
    ("Simulation", "7015"),
    ("Sports", "7016"),
    ("Strategy", "7017"),
    ("Trivia", "7018"),
    ("Word", "7019"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub code: String,
}

/// Country and category chosen for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    pub country: Country,
    pub category: Category,
}

/// Closed lookup tables the user picks from.
#[derive(Debug, Clone)]
pub struct Catalog {
    countries: Vec<Country>,
    categories: Vec<Category>,
}

impl Catalog {
    pub fn new(countries: Vec<Country>, categories: Vec<Category>) -> Self {
        Self { countries, categories }
    }

    pub fn builtin() -> Self {
        let countries = COUNTRIES
            .iter()
            .map(|&(name, code)| Country { name: name.to_string(), code: code.to_string() })
            .collect();
        let categories = CATEGORIES
            .iter()
            .map(|&(name, code)| Category { name: name.to_string(), code: code.to_string() })
            .collect();
        Self::new(countries, categories)
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Match by display name (case-insensitive) or by code.
    pub fn country(&self, query: &str) -> Option<&Country> {
        let query = query.trim();
        self.countries
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(query) || c.code.eq_ignore_ascii_case(query))
    }

    pub fn category(&self, query: &str) -> Option<&Category> {
        let query = query.trim();
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(query) || c.code == query)
    }

    pub fn params(&self, country: &str, category: &str) -> Result<RunParameters> {
        let Some(country) = self.country(country) else {
            anyhow::bail!(
                "unknown country '{}'; expected one of: {}",
                country,
                self.countries.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
            );
        };
        let Some(category) = self.category(category) else {
            anyhow::bail!(
                "unknown category '{}'; expected one of: {}",
                category,
                self.categories.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
            );
        };
        Ok(RunParameters { country: country.clone(), category: category.clone() })
    }
}
