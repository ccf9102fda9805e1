use std::path::Path;

use super::*;

const VALID: &str = r#"
categories:
  - title: Shirts
    description: Everyday tops
  - title: Summer Sale
products:
  - title: Basic Tee
    description: Soft cotton tee
    price: "19.99"
    default_category: Shirts
    categories: [Summer Sale]
    variations:
      - title: Small
        price: "19.99"
        inventory: 12
      - title: Large
        price: "21.99"
        sale_price: "18.00"
  - title: Gift Card
    price: "25.00"
"#;

#[test]
fn parses_valid_catalog() {
    let catalog = parse_catalog(VALID).expect("valid catalog");
    assert_eq!(catalog.categories.len(), 2);
    assert_eq!(catalog.products.len(), 2);

    let tee = &catalog.products[0];
    assert_eq!(tee.default_category.as_deref(), Some("Shirts"));
    assert_eq!(tee.variations.len(), 2);
    assert_eq!(tee.variations[0].inventory, Some(12));
    assert_eq!(tee.variations[1].sale_price, Some(Decimal::new(1800, 2)));
    assert!(tee.active);

    let card = &catalog.products[1];
    assert!(card.categories.is_empty());
    assert!(card.variations.is_empty());
}

#[test]
fn category_slug_derives_from_title() {
    let catalog = parse_catalog(VALID).expect("valid catalog");
    assert_eq!(catalog.categories[1].slug(), "summer-sale");
}

#[test]
fn rejects_duplicate_category_titles() {
    let yaml = "categories:\n  - title: Shirts\n  - title: shirts\n";
    let err = parse_catalog(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("duplicate")));
}

#[test]
fn rejects_unknown_category_reference() {
    let yaml = r#"
categories:
  - title: Shirts
products:
  - title: Boots
    price: "80.00"
    categories: [Footwear]
"#;
    let err = parse_catalog(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("Footwear")));
}

#[test]
fn rejects_negative_price() {
    let yaml = "products:\n  - title: Refund\n    price: \"-1.00\"\n";
    let err = parse_catalog(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("negative")));
}

#[test]
fn rejects_negative_inventory() {
    let yaml = r#"
products:
  - title: Hat
    price: "10.00"
    variations:
      - title: One size
        price: "10.00"
        inventory: -3
"#;
    let err = parse_catalog(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("inventory")));
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let err = parse_catalog("categories: [").unwrap_err();
    assert!(matches!(err, ConfigError::CatalogFileParse(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_catalog(Path::new("/nonexistent/catalog.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::CatalogFileIo { .. }));
}
