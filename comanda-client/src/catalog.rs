//! Catalog Controller
//!
//! Product and category management. Thin CRUD against the collaborator
//! with optimistic store updates; product images go through the opaque
//! asset store.

use std::sync::Arc;

use shared::models::{
    Category, CategoryCreate, CategoryUpdate, Product, ProductCreate, ProductUpdate,
};
use shared::Collection;

use crate::error::FlowResult;
use crate::hub::StoreHub;
use crate::remote::DataService;
use crate::store::Mutation;

pub struct Catalog {
    service: Arc<dyn DataService>,
    hub: Arc<StoreHub>,
}

impl Catalog {
    pub fn new(service: Arc<dyn DataService>, hub: Arc<StoreHub>) -> Self {
        Self { service, hub }
    }

    pub async fn create_product(&self, create: ProductCreate) -> FlowResult<Product> {
        let mut create = create;
        // form layers send "" for "no category"
        if create.category_id.as_deref() == Some("") {
            create.category_id = None;
        }

        let inserted = self
            .service
            .insert(Collection::Products, serde_json::to_value(&create)?)
            .await?;
        let product: Product = serde_json::from_value(inserted)?;
        self.hub
            .products
            .apply_optimistic(Mutation::Insert(product.clone()));
        tracing::debug!(product = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn update_product(&self, product_id: &str, update: ProductUpdate) -> FlowResult<Product> {
        let patch = serde_json::to_value(&update)?;
        let updated = self
            .service
            .update(Collection::Products, product_id, patch.clone())
            .await?;
        let product: Product = serde_json::from_value(updated)?;
        self.hub.products.apply_optimistic(Mutation::Update {
            id: product_id.to_string(),
            patch,
        });
        Ok(product)
    }

    pub async fn delete_product(&self, product_id: &str) -> FlowResult<()> {
        self.service.delete(Collection::Products, product_id).await?;
        self.hub.products.apply_optimistic(Mutation::Delete {
            id: product_id.to_string(),
        });
        Ok(())
    }

    pub async fn create_category(&self, create: CategoryCreate) -> FlowResult<Category> {
        let inserted = self
            .service
            .insert(Collection::Categories, serde_json::to_value(&create)?)
            .await?;
        let category: Category = serde_json::from_value(inserted)?;
        self.hub
            .categories
            .apply_optimistic(Mutation::Insert(category.clone()));
        Ok(category)
    }

    pub async fn update_category(
        &self,
        category_id: &str,
        update: CategoryUpdate,
    ) -> FlowResult<Category> {
        let patch = serde_json::to_value(&update)?;
        let updated = self
            .service
            .update(Collection::Categories, category_id, patch.clone())
            .await?;
        let category: Category = serde_json::from_value(updated)?;
        self.hub.categories.apply_optimistic(Mutation::Update {
            id: category_id.to_string(),
            patch,
        });
        Ok(category)
    }

    /// Upload a product image, returning the opaque URL
    pub async fn upload_image(&self, bytes: Vec<u8>, extension: &str) -> FlowResult<String> {
        Ok(self.service.upload_asset(bytes, extension).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryDataService;

    fn catalog() -> (Arc<StoreHub>, Catalog) {
        let service = Arc::new(MemoryDataService::new());
        let hub = StoreHub::new();
        let catalog = Catalog::new(service, Arc::clone(&hub));
        (hub, catalog)
    }

    #[tokio::test]
    async fn test_create_product_normalizes_empty_category() {
        let (hub, catalog) = catalog();
        let product = catalog
            .create_product(ProductCreate {
                category_id: Some(String::new()),
                name: "Tortilla".into(),
                price: 8.5,
                image_url: None,
                active: true,
            })
            .await
            .unwrap();

        assert_eq!(product.category_id, None);
        assert!(product.active);
        assert_eq!(hub.products.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_image_returns_opaque_url() {
        let (_hub, catalog) = catalog();
        let url = catalog.upload_image(vec![1, 2, 3], "webp").await.unwrap();
        assert!(url.ends_with(".webp"));
    }

    #[tokio::test]
    async fn test_delete_product_removes_from_store() {
        let (hub, catalog) = catalog();
        let product = catalog
            .create_product(ProductCreate {
                category_id: None,
                name: "Flan".into(),
                price: 4.0,
                image_url: None,
                active: true,
            })
            .await
            .unwrap();

        catalog.delete_product(&product.id).await.unwrap();
        assert!(hub.products.is_empty());
    }
}
