use std::path::{Path, PathBuf};

use clap::Subcommand;
use storefront_core::CatalogFile;

const DEFAULT_CATALOG_PATH: &str = "./config/catalog.yaml";

#[derive(Debug, Subcommand)]
pub enum CatalogCommands {
    /// Validate the seed file without touching the database
    Check {
        /// Seed file to check; defaults to `STOREFRONT_CATALOG_PATH`
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub(crate) fn run(command: &CatalogCommands) -> anyhow::Result<()> {
    match command {
        CatalogCommands::Check { path } => {
            let path = path.clone().unwrap_or_else(catalog_path_from_env);
            let catalog = storefront_core::load_catalog(&path)?;
            println!("{}", summarize(&path, &catalog));
        }
    }
    Ok(())
}

fn catalog_path_from_env() -> PathBuf {
    std::env::var("STOREFRONT_CATALOG_PATH")
        .map_or_else(|_| PathBuf::from(DEFAULT_CATALOG_PATH), PathBuf::from)
}

fn summarize(path: &Path, catalog: &CatalogFile) -> String {
    let variations: usize = catalog
        .products
        .iter()
        .map(|p| p.variations.len().max(1))
        .sum();
    format!(
        "{}: {} categories, {} products, {} variations",
        path.display(),
        catalog.categories.len(),
        catalog.products.len(),
        variations
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_implicit_default_variations() {
        let catalog = storefront_core::parse_catalog(
            r#"
categories:
  - title: Tops
products:
  - title: Tee
    price: "10.00"
    default_category: Tops
  - title: Hoodie
    price: "40.00"
    variations:
      - title: Small
        price: "40.00"
      - title: Large
        price: "42.00"
"#,
        )
        .expect("valid catalog");

        assert_eq!(
            summarize(Path::new("catalog.yaml"), &catalog),
            "catalog.yaml: 1 categories, 2 products, 3 variations"
        );
    }
}
