//! Maps a target scene time to a published product, if there is one yet.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, instrument};

use eumdac_client::product::truncate_to_minute;
use eumdac_client::{Catalog, CatalogResult, Product};

/// Half-width of the search window around the target.
pub const SEARCH_HALF_WINDOW_MINUTES: i64 = 30;

/// Identifier of the product acquired exactly at `target` (minute precision).
///
/// `Ok(None)` means the scene is not published yet; that is the normal
/// outcome when polling ahead of the archive.
#[instrument(skip(catalog))]
pub async fn resolve(
    catalog: &dyn Catalog,
    collection: &str,
    target: DateTime<Utc>,
) -> CatalogResult<Option<String>> {
    let window = Duration::minutes(SEARCH_HALF_WINDOW_MINUTES);
    let products = catalog
        .search(collection, target - window, target + window)
        .await?;

    debug!(candidates = products.len(), "Searched around target");
    Ok(select_exact(&products, target).map(|p| p.identifier.clone()))
}

/// First product whose acquisition minute equals `target`'s.
///
/// Near misses are ignored rather than taken as the closest slot.
pub fn select_exact(products: &[Product], target: DateTime<Utc>) -> Option<&Product> {
    let target = truncate_to_minute(target);
    products
        .iter()
        .find(|p| truncate_to_minute(p.date) == target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{product_at, products_at, utc, FailurePlan, FakeCatalog, Stage, COLLECTION};

    #[test]
    fn test_selects_exact_minute_only() {
        let products = products_at(&[
            utc(2024, 1, 15, 13, 58),
            utc(2024, 1, 15, 14, 0),
            utc(2024, 1, 15, 14, 2),
        ]);
        let selected = select_exact(&products, utc(2024, 1, 15, 14, 0)).unwrap();
        assert_eq!(selected.date, utc(2024, 1, 15, 14, 0));
    }

    #[test]
    fn test_no_nearest_neighbour_fallback() {
        let products = products_at(&[utc(2024, 1, 15, 13, 58), utc(2024, 1, 15, 14, 2)]);
        assert!(select_exact(&products, utc(2024, 1, 15, 14, 0)).is_none());
    }

    #[test]
    fn test_seconds_are_ignored() {
        let mut product = product_at(utc(2024, 1, 15, 14, 0));
        product.date = product.date + Duration::seconds(42);
        assert!(select_exact(&[product], utc(2024, 1, 15, 14, 0)).is_some());
    }

    #[tokio::test]
    async fn test_resolve_searches_symmetric_window() {
        let catalog = FakeCatalog::new(FailurePlan::new());
        let target = utc(2024, 1, 15, 14, 0);
        catalog.list_only(product_at(target));

        let found = resolve(&catalog, COLLECTION, target).await.unwrap();
        assert_eq!(found, Some(product_at(target).identifier));
        assert_eq!(
            catalog.search_windows(),
            vec![(utc(2024, 1, 15, 13, 30), utc(2024, 1, 15, 14, 30))]
        );
    }

    #[tokio::test]
    async fn test_resolve_not_published_is_none() {
        let catalog = FakeCatalog::new(FailurePlan::new());
        catalog.list_only(product_at(utc(2024, 1, 15, 13, 45)));

        let found = resolve(&catalog, COLLECTION, utc(2024, 1, 15, 14, 0))
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_resolve_propagates_search_failure() {
        let plan = FailurePlan::new();
        plan.fail(Stage::Search);
        let catalog = FakeCatalog::new(plan);

        assert!(resolve(&catalog, COLLECTION, utc(2024, 1, 15, 14, 0))
            .await
            .is_err());
    }
}
