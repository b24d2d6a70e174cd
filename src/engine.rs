use crate::mapping::{
    self, Classification, ProductField, ProductFieldSet, Unclassified, VariationField,
    VariationFieldSet,
};
use crate::pricing::{PriceReconciler, UnresolvedPriceListPolicy};
use crate::storage::Storage;
use derive_more::{Display, Error};
use futures::future::BoxFuture;
use std::sync::Arc;
use syncdb_types::attribute::{AttributeValueRepository, ByAttributeName};
use syncdb_types::catalog::{CatalogClient, CatalogRecord};
use syncdb_types::price_list::{ByVariation, PriceListItemRepository};
use syncdb_types::product::{ByIdentity, Product, ProductIdentity, ProductRepository, ProductType};
use syncdb_types::term::{ByName, ByProgramCode, Term, TermRepository, Vocabulary};
use syncdb_types::variation::{ByProduct, BySyncDbId, Variation, VariationRepository};
use syncdb_types::LogLevel;
use typesafe_repository::async_ops::{Remove, Save, Select};
use typesafe_repository::IdentityOf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Saved,
    Skipped(Unclassified),
}

#[derive(Debug, Display, Error)]
pub enum SyncError {
    #[display("Unable to fetch SyncDB product {product_id}: {source}")]
    RemoteFetch {
        product_id: String,
        source: anyhow::Error,
    },
    #[display("Reference cycle through SyncDB product {_0}")]
    #[error(ignore)]
    CycleDetected(String),
    #[display("Storage failure: {_0}")]
    Storage(anyhow::Error),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SyncOptions {
    pub log_level: LogLevel,
    pub unresolved_price_list: UnresolvedPriceListPolicy,
}

/// Synchronizes single SyncDB products into the local catalog
pub struct SyncEngine {
    client: Arc<dyn CatalogClient>,
    products: Arc<dyn ProductRepository>,
    variations: Arc<dyn VariationRepository>,
    price_list_items: Arc<dyn PriceListItemRepository>,
    terms: Arc<dyn TermRepository>,
    attributes: Arc<dyn AttributeValueRepository>,
    reconciler: PriceReconciler,
    opts: SyncOptions,
}

impl SyncEngine {
    pub fn new(client: Arc<dyn CatalogClient>, storage: &Storage, opts: SyncOptions) -> Self {
        Self {
            client,
            products: storage.products.clone(),
            variations: storage.variations.clone(),
            price_list_items: storage.price_list_items.clone(),
            terms: storage.terms.clone(),
            attributes: storage.attributes.clone(),
            reconciler: PriceReconciler::new(
                storage.price_lists.clone(),
                storage.price_list_items.clone(),
                opts.unresolved_price_list,
            ),
            opts,
        }
    }

    pub async fn sync_one(&self, product_id: &str) -> Result<SyncOutcome, SyncError> {
        self.sync_in_chain(product_id.to_string(), Vec::new()).await
    }

    /// `chain` holds the external ids whose sync is in progress up the call stack
    fn sync_in_chain(
        &self,
        product_id: String,
        mut chain: Vec<String>,
    ) -> BoxFuture<'_, Result<SyncOutcome, SyncError>> {
        Box::pin(async move {
            if chain.contains(&product_id) {
                return Err(SyncError::CycleDetected(product_id));
            }
            chain.push(product_id.clone());

            let record = self
                .client
                .get_product(&product_id, self.opts.log_level)
                .await
                .map_err(|source| SyncError::RemoteFetch {
                    product_id: product_id.clone(),
                    source,
                })?;
            let Classification {
                product_type,
                variation_type,
            } = match mapping::classify(record.format()) {
                Ok(c) => c,
                Err(reason) => {
                    log::error!("Unable to import product with SyncDB ID {product_id}: {reason}");
                    return Ok(SyncOutcome::Skipped(reason));
                }
            };
            let price_list = self
                .client
                .get_price_list(&product_id, self.opts.log_level)
                .await
                .map_err(|source| SyncError::RemoteFetch {
                    product_id: product_id.clone(),
                    source,
                })?;

            let identity = self.resolve_identity(product_type, &record).await?;
            let (mut product, product_is_new) =
                match self.products.select(&ByIdentity(identity.clone())).await?.into_iter().next() {
                    Some(p) => (p, false),
                    None => (Product::new(identity), true),
                };
            let fields = mapping::map_product_fields(product_type, &record, product_is_new);
            self.apply_product_fields(&mut product, fields, &record, &chain)
                .await?;

            let siblings = self.variations.select(&ByProduct(product.id)).await?;
            let (mut variation, variation_is_new) = match siblings.iter().find(|v| {
                v.variation_type == variation_type
                    && v.syncdb_id.as_deref() == Some(record.product_id.as_str())
            }) {
                Some(v) => (v.clone(), false),
                None => (Variation::new(variation_type, product.id), true),
            };
            let fields = mapping::map_variation_fields(variation_type, &record, variation_is_new);
            self.apply_variation_fields(&mut variation, fields, &record, &chain)
                .await?;

            self.remove_orphans(&record.product_id, &product).await?;

            product.published = product.published
                && siblings
                    .iter()
                    .filter(|v| v.id != variation.id)
                    .chain(std::iter::once(&variation))
                    .any(|v| v.published);
            self.products.save(product.clone()).await?;
            self.variations.save(variation.clone()).await?;

            let reconciliation = self.reconciler.reconcile(&mut variation, &price_list).await?;
            if reconciliation.base_price_changed {
                self.variations.save(variation).await?;
            }
            log::info!(
                "Product imported successfully: {} (SyncDB ID {product_id})",
                product.title
            );
            Ok(SyncOutcome::Saved)
        })
    }

    async fn resolve_identity(
        &self,
        product_type: ProductType,
        record: &CatalogRecord,
    ) -> Result<ProductIdentity, SyncError> {
        let language = match record.language() {
            Some(name) => Some(self.ensure_term(Vocabulary::Languages, name).await?),
            None => None,
        };
        let revision = match record.revision_code.as_deref() {
            Some(name) => Some(self.ensure_term(Vocabulary::Revisions, name).await?),
            None => None,
        };
        Ok(ProductIdentity {
            product_type,
            program_code: record.program_code.clone(),
            spec_code: record.special_product_code.clone(),
            language,
            revision,
        })
    }

    /// Finds the term by name, creating it when the vocabulary lacks it
    async fn ensure_term(
        &self,
        vocabulary: Vocabulary,
        name: &str,
    ) -> Result<IdentityOf<Term>, SyncError> {
        let name = name.trim();
        let existing = self
            .terms
            .select(&ByName {
                vocabulary,
                name: name.to_string(),
            })
            .await?;
        match existing.into_iter().next() {
            Some(term) => Ok(term.id),
            None => {
                let term = Term::new(vocabulary, name);
                let id = term.id;
                self.terms.save(term).await?;
                log::info!("Created {vocabulary} term {name}");
                Ok(id)
            }
        }
    }

    /// Syncs a referenced product first and returns its local variation
    async fn resolve_reference(
        &self,
        target: &str,
        own_id: &str,
        chain: &[String],
    ) -> Result<Option<IdentityOf<Variation>>, SyncError> {
        if target != own_id {
            self.sync_in_chain(target.to_string(), chain.to_vec()).await?;
        }
        Ok(self
            .variations
            .select(&BySyncDbId(target.to_string()))
            .await?
            .into_iter()
            .next()
            .map(|v| v.id))
    }

    async fn apply_product_fields(
        &self,
        product: &mut Product,
        fields: ProductFieldSet,
        record: &CatalogRecord,
        chain: &[String],
    ) -> Result<(), SyncError> {
        for field in fields {
            match field {
                ProductField::Owner(owner) => product.owner_id = owner,
                ProductField::Title(title) => product.title = title,
                ProductField::Published(published) => product.published = published,
                ProductField::Language(name) => {
                    product.language = Some(self.ensure_term(Vocabulary::Languages, &name).await?)
                }
                ProductField::Body(body) => product.details.body = body,
                ProductField::ProgramCode(code) => product.program_code = code,
                ProductField::SpecCode(code) => product.spec_code = code,
                ProductField::Isbn(isbn) => product.details.isbn = isbn,
                ProductField::Pages(pages) => product.details.pages = pages,
                ProductField::TableOfContents(url) => product.details.table_of_contents = url,
                ProductField::Year(name) => {
                    product.details.year = Some(self.ensure_term(Vocabulary::Years, &name).await?)
                }
                ProductField::Revision(name) => {
                    product.revision = Some(self.ensure_term(Vocabulary::Revisions, &name).await?)
                }
                ProductField::PublishedDate(date) => product.details.published_date = date,
                ProductField::AnsiApproved(v) => product.details.ansi_approved = v,
                ProductField::DodAdopted(v) => product.details.dod_adopted = v,
                ProductField::SamplePagesUrl(url) => product.details.sample_pages_url = url,
                ProductField::TocUrl(url) => product.details.toc_url = url,
                ProductField::LaterRevision(target) => {
                    if let Some(id) = self
                        .resolve_reference(&target, &record.product_id, chain)
                        .await?
                    {
                        product.details.later_revision = Some(id);
                    }
                }
                ProductField::DocumentNumber(program_code) => {
                    let term = self
                        .terms
                        .select(&ByProgramCode {
                            vocabulary: Vocabulary::DocumentNumbers,
                            program_code,
                        })
                        .await?
                        .into_iter()
                        .next();
                    if let Some(term) = term {
                        product.details.document_number = Some(term.id);
                    }
                }
            }
        }
        Ok(())
    }

    async fn apply_variation_fields(
        &self,
        variation: &mut Variation,
        fields: VariationFieldSet,
        record: &CatalogRecord,
        chain: &[String],
    ) -> Result<(), SyncError> {
        for field in fields {
            match field {
                VariationField::Owner(owner) => variation.owner_id = owner,
                VariationField::Title(title) => variation.title = title,
                VariationField::Published(published) => variation.published = published,
                VariationField::NetsuiteId(id) => variation.details.netsuite_id = id,
                VariationField::SyncDbId(id) => variation.syncdb_id = Some(id),
                VariationField::Sku(sku) => variation.sku = sku,
                VariationField::Weight(weight) => variation.details.weight = weight,
                VariationField::ReleaseDate(date) => variation.details.release_date = date,
                VariationField::Format(name) => {
                    let value = self
                        .attributes
                        .select(&ByAttributeName::format(name))
                        .await?
                        .into_iter()
                        .next();
                    if let Some(value) = value {
                        variation.details.format = Some(value.id);
                    }
                }
                VariationField::TaxationCode(code) => variation.details.taxation_code = code,
                VariationField::ProductFormat(tag) => variation.details.product_format = Some(tag),
                VariationField::ItemType(tag) => variation.details.item_type = Some(tag),
                VariationField::Dropshipped(v) => variation.details.dropshipped = Some(v),
                VariationField::StockLevel(v) => variation.details.stock_level = v,
                VariationField::Drm(v) => variation.details.drm = Some(v),
                VariationField::LicenseExpiration(v) => {
                    variation.details.license_expiration = Some(v)
                }
                VariationField::LicenseType(v) => variation.details.license_type = Some(v),
                VariationField::MinimumOrderQuantity(v) => {
                    variation.details.minimum_order_quantity = v
                }
                VariationField::KitComponents(targets) => {
                    let mut components = Vec::with_capacity(targets.len());
                    for target in targets {
                        if let Some(id) = self
                            .resolve_reference(&target, &record.product_id, chain)
                            .await?
                        {
                            components.push(id);
                        }
                    }
                    variation.details.kit_products = components;
                }
            }
        }
        Ok(())
    }

    /// Deletes variations bound to `syncdb_id` under another product,
    /// together with their product once it has no variations left
    async fn remove_orphans(&self, syncdb_id: &str, product: &Product) -> Result<(), SyncError> {
        let orphans: Vec<Variation> = self
            .variations
            .select(&BySyncDbId(syncdb_id.to_string()))
            .await?
            .into_iter()
            .filter(|v| v.product_id != product.id)
            .collect();
        for orphan in orphans {
            log::info!(
                "Moving SyncDB product {syncdb_id} from product {} to {}",
                orphan.product_id,
                product.id
            );
            self.remove_variation(&orphan).await?;
            if self
                .variations
                .select(&ByProduct(orphan.product_id))
                .await?
                .is_empty()
            {
                self.products.remove(&orphan.product_id).await?;
            }
        }
        Ok(())
    }

    /// Removes the variation together with its price list items
    pub async fn remove_variation(&self, variation: &Variation) -> Result<(), anyhow::Error> {
        for item in self
            .price_list_items
            .select(&ByVariation(variation.id))
            .await?
        {
            self.price_list_items.remove(&item.id).await?;
        }
        self.variations.remove(&variation.id).await
    }
}
