use super::*;

const VALID_SEED: &str = r"
categories:
  - name: Groceries
  - name: Rice & Grains
    parent: groceries
suppliers:
  - name: Balogun Wholesale
  - name: Kano Grains Ltd
    slug: kano-grains
products:
  - name: Ofada Rice
    category: rice-grains
    margin_percent: '12.5'
    variants:
      - sku: OFADA-5KG
        title: 5kg bag
        attributes:
          weight: 5kg
        offers:
          - supplier: balogun-wholesale
            price: '9500'
            quantity: 40
          - supplier: kano-grains
            price: '9200'
            quantity: 10
  - name: Palm Oil
    category: groceries
    offers:
      - supplier: balogun-wholesale
        price: '3800.50'
        quantity: 25
";

#[test]
fn slugify_collapses_punctuation() {
    assert_eq!(slugify("Rice & Grains"), "rice-grains");
    assert_eq!(slugify("  Ofada   Rice (5kg) "), "ofada-rice-5kg");
    assert_eq!(slugify("Àgbàdo"), "gb-do");
    assert_eq!(slugify("---"), "");
}

#[test]
fn parses_valid_seed() {
    let seed = parse_catalog_seed(VALID_SEED).expect("valid seed");
    assert_eq!(seed.categories.len(), 2);
    assert_eq!(seed.categories[1].slug(), "rice-grains");
    assert_eq!(seed.suppliers[1].slug(), "kano-grains");
    assert_eq!(seed.products[0].slug(), "ofada-rice");
    assert_eq!(
        seed.products[0].margin_percent,
        Some("12.5".parse().unwrap())
    );
    let variant = &seed.products[0].variants[0];
    assert_eq!(variant.attributes.get("weight").map(String::as_str), Some("5kg"));
    assert_eq!(variant.offers.len(), 2);
    assert_eq!(seed.products[1].offers[0].price, "3800.50".parse().unwrap());
}

#[test]
fn rejects_unknown_parent_category() {
    let yaml = "categories:\n  - name: Rice\n    parent: groceries\n";
    let err = parse_catalog_seed(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("unknown parent")));
}

#[test]
fn rejects_duplicate_skus() {
    let yaml = r"
categories:
  - name: Drinks
suppliers:
  - name: Ade
products:
  - name: Zobo
    category: drinks
    variants:
      - sku: ZOBO-1L
        title: 1 litre
  - name: Kunu
    category: drinks
    variants:
      - sku: ZOBO-1L
        title: 1 litre
";
    let err = parse_catalog_seed(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate variant sku")));
}

#[test]
fn rejects_offer_from_unknown_supplier() {
    let yaml = r"
categories:
  - name: Drinks
products:
  - name: Zobo
    category: drinks
    offers:
      - supplier: ghost
        price: '500'
        quantity: 3
";
    let err = parse_catalog_seed(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("unknown supplier")));
}

#[test]
fn rejects_negative_offer_quantity() {
    let yaml = r"
categories:
  - name: Drinks
suppliers:
  - name: Ade
products:
  - name: Zobo
    category: drinks
    offers:
      - supplier: ade
        price: '500'
        quantity: -1
";
    let err = parse_catalog_seed(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("negative")));
}

#[test]
fn rejects_product_in_unknown_category() {
    let yaml = "products:\n  - name: Zobo\n    category: drinks\n";
    let err = parse_catalog_seed(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("unknown category")));
}

#[test]
fn malformed_yaml_is_parse_error() {
    let err = parse_catalog_seed("categories: [").unwrap_err();
    assert!(matches!(err, ConfigError::SeedFileParse(_)));
}

#[test]
fn missing_file_is_io_error() {
    let err = load_catalog_seed(Path::new("/nonexistent/catalog.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::SeedFileIo { .. }));
}

#[test]
fn bundled_development_catalog_is_valid() {
    let seed = parse_catalog_seed(include_str!("../../../config/catalog.yaml"))
        .expect("config/catalog.yaml should validate");
    assert!(seed.products.iter().any(|p| !p.variants.is_empty()));
    assert!(seed.categories.iter().any(|c| c.parent.is_some()));
}
