use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Generate a URL-safe slug: lowercase ASCII alphanumerics separated by single dashes.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    pub slug: Option<String>,
    /// Slug of a category declared earlier in the file.
    pub parent: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl CategorySeed {
    #[must_use]
    pub fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierSeed {
    pub name: String,
    pub slug: Option<String>,
    pub bank_code: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
}

impl SupplierSeed {
    #[must_use]
    pub fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferSeed {
    /// Supplier slug.
    pub supplier: String,
    pub price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantSeed {
    pub sku: String,
    pub title: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub offers: Vec<OfferSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    pub slug: Option<String>,
    /// Category slug.
    pub category: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub margin_percent: Option<Decimal>,
    #[serde(default)]
    pub variants: Vec<VariantSeed>,
    #[serde(default)]
    pub offers: Vec<OfferSeed>,
}

impl ProductSeed {
    #[must_use]
    pub fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub suppliers: Vec<SupplierSeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

/// Load and validate the catalog seed from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog_seed(path: &Path) -> Result<CatalogSeed, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_catalog_seed(&content)
}

/// Parse and validate catalog seed YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_catalog_seed(content: &str) -> Result<CatalogSeed, ConfigError> {
    let seed: CatalogSeed = serde_yaml::from_str(content)?;
    validate_catalog_seed(&seed)?;
    Ok(seed)
}

fn validate_catalog_seed(seed: &CatalogSeed) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::Validation(msg));

    let mut categories = HashSet::new();
    for category in &seed.categories {
        let slug = category.slug();
        if slug.is_empty() {
            return invalid(format!("category '{}' has an empty slug", category.name));
        }
        if let Some(parent) = &category.parent {
            if !categories.contains(parent.as_str()) {
                return invalid(format!(
                    "category '{slug}' references unknown parent '{parent}' (parents must be listed first)"
                ));
            }
        }
        if !categories.insert(slug.clone()) {
            return invalid(format!("duplicate category slug '{slug}'"));
        }
    }

    let mut suppliers = HashSet::new();
    for supplier in &seed.suppliers {
        let slug = supplier.slug();
        if slug.is_empty() {
            return invalid(format!("supplier '{}' has an empty slug", supplier.name));
        }
        if !suppliers.insert(slug.clone()) {
            return invalid(format!("duplicate supplier slug '{slug}'"));
        }
    }

    let check_offers = |owner: &str, offers: &[OfferSeed]| -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for offer in offers {
            if !suppliers.contains(offer.supplier.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{owner}: offer references unknown supplier '{}'",
                    offer.supplier
                )));
            }
            if !seen.insert(offer.supplier.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{owner}: supplier '{}' listed twice",
                    offer.supplier
                )));
            }
            if offer.price < Decimal::ZERO || offer.quantity < 0 {
                return Err(ConfigError::Validation(format!(
                    "{owner}: offer from '{}' has a negative price or quantity",
                    offer.supplier
                )));
            }
        }
        Ok(())
    };

    let mut products = HashSet::new();
    let mut skus = HashSet::new();
    for product in &seed.products {
        let slug = product.slug();
        if slug.is_empty() {
            return invalid(format!("product '{}' has an empty slug", product.name));
        }
        if !products.insert(slug.clone()) {
            return invalid(format!("duplicate product slug '{slug}'"));
        }
        if !categories.contains(product.category.as_str()) {
            return invalid(format!(
                "product '{slug}' references unknown category '{}'",
                product.category
            ));
        }
        if product.margin_percent.is_some_and(|m| m < Decimal::ZERO) {
            return invalid(format!("product '{slug}' has a negative margin_percent"));
        }
        check_offers(&format!("product '{slug}'"), &product.offers)?;

        for variant in &product.variants {
            let sku = variant.sku.trim();
            if sku.is_empty() {
                return invalid(format!("product '{slug}' has a variant with an empty sku"));
            }
            if !skus.insert(sku.to_string()) {
                return invalid(format!("duplicate variant sku '{sku}'"));
            }
            check_offers(&format!("variant '{sku}'"), &variant.offers)?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
