//! Translation of SyncDB records into the fields written on local entities.
//!
//! Every product and variation type has its own mapper. A mapper only emits
//! the fields it owns, anything it leaves out keeps its stored value.

use derive_more::Display;
use syncdb_types::catalog::CatalogRecord;
use syncdb_types::product::ProductType;
use syncdb_types::variation::{IntervalPeriod, LicenseExpiration, LicenseType, VariationType, Weight};
use syncdb_types::SYSTEM_OWNER;

pub const ROLLING_LICENSE_DAYS: u32 = 30;
pub const FILE_DOWNLOAD_LIMIT: u32 = 3;

const FORMATS: &[(&str, ProductType, VariationType)] = &[
    ("CD", ProductType::Document, VariationType::PhysicalDocument),
    ("DVD", ProductType::Document, VariationType::PhysicalDocument),
    ("Hard Copy", ProductType::Document, VariationType::PhysicalDocument),
    ("Download", ProductType::Document, VariationType::DigitalDocument),
    ("Download Item", ProductType::Document, VariationType::DigitalDocument),
    ("Kit/Bundle", ProductType::Kit, VariationType::Kit),
    ("Subscription", ProductType::Service, VariationType::Service),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    pub product_type: ProductType,
    pub variation_type: VariationType,
}

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum Unclassified {
    #[display("productFormat field not set")]
    FormatMissing,
    #[display("unable to map productFormat value \"{_0}\" to a product type")]
    FormatUnrecognized(String),
}

pub fn classify(format: Option<&str>) -> Result<Classification, Unclassified> {
    let format = format.ok_or(Unclassified::FormatMissing)?;
    FORMATS
        .iter()
        .find(|(name, _, _)| *name == format)
        .map(|(_, product_type, variation_type)| Classification {
            product_type: *product_type,
            variation_type: *variation_type,
        })
        .ok_or_else(|| Unclassified::FormatUnrecognized(format.to_string()))
}

/// Storefront tag of the product format
pub fn normalized_product_format(format: Option<&str>) -> &'static str {
    match format {
        Some("CD") => "cd",
        Some("DVD") => "dvd",
        Some("Hard Copy") => "hardcopy",
        Some("Download") | Some("Download Item") => "download",
        _ => "",
    }
}

pub fn normalized_item_type(item_type: Option<&str>) -> &'static str {
    match item_type {
        Some("Download Item") => "download",
        Some("Service") => "service",
        _ => "",
    }
}

/// Keeps the date part of a SyncDB timestamp
pub fn truncate_date(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().chars().take(10).collect::<String>())
        .filter(|v| !v.is_empty())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProductField {
    Owner(u32),
    Title(String),
    Published(bool),
    /// Name of the language term
    Language(String),
    Body(Option<String>),
    ProgramCode(Option<String>),
    SpecCode(Option<String>),
    Isbn(Option<String>),
    Pages(Option<u32>),
    TableOfContents(Option<String>),
    /// Name of the year term
    Year(String),
    /// Name of the revision term
    Revision(String),
    PublishedDate(Option<String>),
    AnsiApproved(bool),
    DodAdopted(bool),
    SamplePagesUrl(Option<String>),
    TocUrl(Option<String>),
    /// External id of the superseding product
    LaterRevision(String),
    /// Program code of the document number term
    DocumentNumber(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariationField {
    Owner(u32),
    Title(String),
    Published(bool),
    NetsuiteId(Option<String>),
    SyncDbId(String),
    Sku(Option<String>),
    Weight(Option<Weight>),
    ReleaseDate(Option<String>),
    /// Name of the format attribute value
    Format(String),
    TaxationCode(Option<String>),
    ProductFormat(String),
    ItemType(String),
    Dropshipped(bool),
    StockLevel(Option<i64>),
    Drm(bool),
    LicenseExpiration(LicenseExpiration),
    LicenseType(LicenseType),
    MinimumOrderQuantity(Option<u32>),
    /// External ids of the kit components
    KitComponents(Vec<String>),
}

/// Immutable set of fields to write on one entity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSet<F>(Vec<F>);

impl<F> FieldSet<F> {
    pub fn iter(&self) -> std::slice::Iter<'_, F> {
        self.0.iter()
    }
}

impl<F> IntoIterator for FieldSet<F> {
    type Item = F;
    type IntoIter = std::vec::IntoIter<F>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

pub type ProductFieldSet = FieldSet<ProductField>;
pub type VariationFieldSet = FieldSet<VariationField>;

type ProductMapper = fn(&CatalogRecord, bool) -> Vec<ProductField>;
type VariationMapper = fn(&CatalogRecord, bool) -> Vec<VariationField>;

fn product_mapper(product_type: ProductType) -> ProductMapper {
    match product_type {
        ProductType::Document => document_fields,
        ProductType::Kit => kit_fields,
        ProductType::Service => core_product_fields,
    }
}

fn variation_mapper(variation_type: VariationType) -> VariationMapper {
    match variation_type {
        VariationType::PhysicalDocument => physical_document_fields,
        VariationType::DigitalDocument => digital_document_fields,
        VariationType::Kit => kit_variation_fields,
        VariationType::Service => service_variation_fields,
    }
}

pub fn map_product_fields(
    product_type: ProductType,
    record: &CatalogRecord,
    is_new: bool,
) -> ProductFieldSet {
    FieldSet(product_mapper(product_type)(record, is_new))
}

pub fn map_variation_fields(
    variation_type: VariationType,
    record: &CatalogRecord,
    is_new: bool,
) -> VariationFieldSet {
    FieldSet(variation_mapper(variation_type)(record, is_new))
}

fn core_product_fields(record: &CatalogRecord, is_new: bool) -> Vec<ProductField> {
    let mut fields = vec![
        ProductField::Owner(SYSTEM_OWNER),
        ProductField::Title(record.title()),
    ];
    if is_new {
        fields.push(ProductField::Published(false));
    }
    if let Some(language) = record.language() {
        fields.push(ProductField::Language(language.to_string()));
    }
    fields.push(ProductField::Body(record.store_detailed_description.clone()));
    fields
}

/// Fields shared by documents and kits
fn catalogued_fields(record: &CatalogRecord, is_new: bool) -> Vec<ProductField> {
    let mut fields = vec![
        ProductField::ProgramCode(record.program_code.clone()),
        ProductField::SpecCode(record.special_product_code.clone()),
    ];
    if let Some(year) = record.published_year.as_deref().filter(|y| *y != "0") {
        fields.push(ProductField::Year(year.to_string()));
    }
    if let Some(revision) = &record.revision_code {
        fields.push(ProductField::Revision(revision.clone()));
    }
    fields.extend([
        ProductField::PublishedDate(truncate_date(record.published_date.as_deref())),
        ProductField::AnsiApproved(record.ansi_approved.unwrap_or(false)),
        ProductField::DodAdopted(record.dod_adopted.unwrap_or(false)),
    ]);
    if let Some(later_revision) = record.later_revision_id() {
        fields.push(ProductField::LaterRevision(later_revision.to_string()));
    }
    if let (true, Some(program_code)) = (is_new, &record.program_code) {
        fields.push(ProductField::DocumentNumber(program_code.clone()));
    }
    fields
}

fn document_fields(record: &CatalogRecord, is_new: bool) -> Vec<ProductField> {
    let mut fields = core_product_fields(record, is_new);
    fields.extend([
        ProductField::Isbn(record.isbn.clone()),
        ProductField::Pages(record.number_of_pages),
        ProductField::TableOfContents(record.table_of_contents_url.clone()),
    ]);
    fields.extend(catalogued_fields(record, is_new));
    fields.extend([
        ProductField::SamplePagesUrl(record.sample_pages_url.clone()),
        ProductField::TocUrl(record.table_of_contents_url.clone()),
    ]);
    fields
}

fn kit_fields(record: &CatalogRecord, is_new: bool) -> Vec<ProductField> {
    let mut fields = core_product_fields(record, is_new);
    fields.extend(catalogued_fields(record, is_new));
    fields
}

/// `Some(false)` unpublishes, `None` keeps the stored status
pub fn publish_decision(record: &CatalogRecord, is_new: bool) -> Option<bool> {
    match (record.is_visible(), is_new) {
        (false, _) => Some(false),
        (true, true) => Some(false),
        (true, false) => None,
    }
}

fn core_variation_fields(record: &CatalogRecord, is_new: bool) -> Vec<VariationField> {
    let mut fields = vec![
        VariationField::Owner(SYSTEM_OWNER),
        VariationField::Title(record.title()),
    ];
    if let Some(published) = publish_decision(record, is_new) {
        fields.push(VariationField::Published(published));
    }
    fields.extend([
        VariationField::NetsuiteId(record.ns_product_id.clone()),
        VariationField::SyncDbId(record.product_id.clone()),
        VariationField::Sku(record.product_number.clone()),
    ]);
    fields
}

fn weight(record: &CatalogRecord) -> Option<Weight> {
    record.weight.map(|number| Weight {
        number,
        unit: record.weight_unit().map(ToString::to_string),
    })
}

fn format_attribute(record: &CatalogRecord) -> Option<VariationField> {
    record.format_code.clone().map(VariationField::Format)
}

fn license_fields(drm: bool) -> Vec<VariationField> {
    match drm {
        true => vec![VariationField::LicenseExpiration(LicenseExpiration::Unlimited)],
        false => vec![
            VariationField::LicenseExpiration(LicenseExpiration::RollingInterval {
                interval: ROLLING_LICENSE_DAYS,
                period: IntervalPeriod::Day,
            }),
            VariationField::LicenseType(LicenseType::CommerceFile {
                file_download_limit: FILE_DOWNLOAD_LIMIT,
            }),
        ],
    }
}

fn physical_document_fields(record: &CatalogRecord, is_new: bool) -> Vec<VariationField> {
    let mut fields = core_variation_fields(record, is_new);
    fields.extend([
        VariationField::Weight(weight(record)),
        VariationField::ReleaseDate(truncate_date(record.release_date.as_deref())),
    ]);
    fields.extend(format_attribute(record));
    fields.extend([
        VariationField::TaxationCode(record.taxation_code().map(ToString::to_string)),
        VariationField::ProductFormat(normalized_product_format(record.format()).to_string()),
        VariationField::Dropshipped(record.drop_ship_product.unwrap_or(false)),
        VariationField::StockLevel(record.quantity_available),
    ]);
    fields
}

fn digital_document_fields(record: &CatalogRecord, is_new: bool) -> Vec<VariationField> {
    let drm = record.drm.unwrap_or(false);
    let mut fields = core_variation_fields(record, is_new);
    fields.push(VariationField::ReleaseDate(truncate_date(
        record.release_date.as_deref(),
    )));
    fields.extend(format_attribute(record));
    fields.extend([
        VariationField::TaxationCode(record.taxation_code().map(ToString::to_string)),
        VariationField::Drm(drm),
        VariationField::ProductFormat(normalized_product_format(record.format()).to_string()),
        VariationField::ItemType(normalized_item_type(record.item_type()).to_string()),
    ]);
    fields.extend(license_fields(drm));
    if let Some(quantity) = record.minimum_quantity.filter(|q| *q > 0) {
        fields.push(VariationField::MinimumOrderQuantity(Some(quantity)));
    }
    fields
}

fn service_variation_fields(record: &CatalogRecord, is_new: bool) -> Vec<VariationField> {
    let mut fields = core_variation_fields(record, is_new);
    fields.push(VariationField::MinimumOrderQuantity(record.minimum_quantity));
    fields
}

fn kit_variation_fields(record: &CatalogRecord, is_new: bool) -> Vec<VariationField> {
    let mut fields = core_variation_fields(record, is_new);
    fields.push(VariationField::Weight(weight(record)));
    let components = record.component_ids();
    if !components.is_empty() {
        fields.push(VariationField::KitComponents(components));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;
    use rust_decimal_macros::dec;

    #[test]
    fn classifies_known_formats() {
        let cases = [
            ("CD", ProductType::Document, VariationType::PhysicalDocument),
            ("DVD", ProductType::Document, VariationType::PhysicalDocument),
            ("Hard Copy", ProductType::Document, VariationType::PhysicalDocument),
            ("Download", ProductType::Document, VariationType::DigitalDocument),
            ("Download Item", ProductType::Document, VariationType::DigitalDocument),
            ("Kit/Bundle", ProductType::Kit, VariationType::Kit),
            ("Subscription", ProductType::Service, VariationType::Service),
        ];
        for (format, product_type, variation_type) in cases {
            assert_eq!(
                classify(Some(format)),
                Ok(Classification {
                    product_type,
                    variation_type
                }),
                "{format}"
            );
        }
    }

    #[test]
    fn rejects_missing_and_unknown_formats() {
        assert_eq!(classify(None), Err(Unclassified::FormatMissing));
        assert_eq!(
            classify(Some("Vinyl")),
            Err(Unclassified::FormatUnrecognized("Vinyl".to_string()))
        );
        assert_eq!(
            classify(Some("cd")),
            Err(Unclassified::FormatUnrecognized("cd".to_string()))
        );
        assert_eq!(
            Unclassified::FormatUnrecognized("Vinyl".to_string()).to_string(),
            "unable to map productFormat value \"Vinyl\" to a product type"
        );
    }

    #[test]
    fn new_product_starts_unpublished() {
        let r = record("10", "Hard Copy");
        let fields = map_product_fields(ProductType::Document, &r, true);
        assert!(fields.iter().any(|f| *f == ProductField::Published(false)));
        assert!(fields
            .iter()
            .any(|f| *f == ProductField::DocumentNumber("A-610".to_string())));

        let fields = map_product_fields(ProductType::Document, &r, false);
        assert!(!fields.iter().any(|f| matches!(f, ProductField::Published(_))));
        assert!(!fields.iter().any(|f| matches!(f, ProductField::DocumentNumber(_))));
    }

    #[test]
    fn service_product_maps_core_fields_only() {
        let r = record("10", "Subscription");
        let fields = map_product_fields(ProductType::Service, &r, false);
        assert_eq!(
            fields.into_iter().collect::<Vec<_>>(),
            vec![
                ProductField::Owner(0),
                ProductField::Title("Title 10".to_string()),
                ProductField::Language("English".to_string()),
                ProductField::Body(Some("<p>Body 10</p>".to_string())),
            ]
        );
    }

    #[test]
    fn kit_product_skips_document_only_fields() {
        let mut r = record("10", "Kit/Bundle");
        r.later_revision = Some(syncdb_types::catalog::ProductRef {
            product_id: Some("11".to_string()),
        });
        let fields = map_product_fields(ProductType::Kit, &r, false);
        assert!(fields
            .iter()
            .any(|f| *f == ProductField::LaterRevision("11".to_string())));
        assert!(!fields.iter().any(|f| matches!(
            f,
            ProductField::Isbn(_)
                | ProductField::Pages(_)
                | ProductField::TableOfContents(_)
                | ProductField::SamplePagesUrl(_)
                | ProductField::TocUrl(_)
        )));
    }

    #[test]
    fn empty_language_and_zero_year_are_not_mapped() {
        let mut r = record("10", "CD");
        r.language = None;
        r.published_year = Some("0".to_string());
        r.revision_code = None;
        r.published_date = Some("2021-04-30T00:00:00".to_string());
        let fields = map_product_fields(ProductType::Document, &r, false);
        assert!(!fields.iter().any(|f| matches!(
            f,
            ProductField::Language(_) | ProductField::Year(_) | ProductField::Revision(_)
        )));
        assert!(fields
            .iter()
            .any(|f| *f == ProductField::PublishedDate(Some("2021-04-30".to_string()))));
    }

    #[test]
    fn publish_flag_follows_visibility() {
        let mut r = record("10", "CD");
        assert_eq!(publish_decision(&r, true), Some(false));
        assert_eq!(publish_decision(&r, false), None);
        r.in_active = Some(true);
        assert_eq!(publish_decision(&r, false), Some(false));
        r.in_active = Some(false);
        r.display_in_website = Some(false);
        assert_eq!(publish_decision(&r, false), Some(false));
    }

    #[test]
    fn physical_document_fields() {
        let mut r = record("10", "Hard Copy");
        r.weight = Some(dec!(1.25));
        r.weight_units = Some(syncdb_types::catalog::WeightUnitsField {
            weight_units: Some("lb".to_string()),
        });
        r.quantity_available = Some(12);
        let fields = map_variation_fields(VariationType::PhysicalDocument, &r, false);
        for expected in [
            VariationField::SyncDbId("10".to_string()),
            VariationField::Sku(Some("SKU-10".to_string())),
            VariationField::Weight(Some(Weight {
                number: dec!(1.25),
                unit: Some("lb".to_string()),
            })),
            VariationField::Format("HC".to_string()),
            VariationField::ProductFormat("hardcopy".to_string()),
            VariationField::Dropshipped(false),
            VariationField::StockLevel(Some(12)),
        ] {
            assert!(fields.iter().any(|f| *f == expected), "{expected:?}");
        }
        assert!(!fields.iter().any(|f| matches!(f, VariationField::Published(_))));
    }

    #[test]
    fn digital_document_license_depends_on_drm() {
        let mut r = record("10", "Download Item");
        r.drm = Some(false);
        r.minimum_quantity = Some(0);
        let fields = map_variation_fields(VariationType::DigitalDocument, &r, true);
        assert!(fields.iter().any(|f| *f
            == VariationField::LicenseExpiration(LicenseExpiration::RollingInterval {
                interval: 30,
                period: IntervalPeriod::Day
            })));
        assert!(fields.iter().any(|f| *f
            == VariationField::LicenseType(LicenseType::CommerceFile {
                file_download_limit: 3
            })));
        assert!(fields.iter().any(|f| *f == VariationField::Published(false)));
        assert!(!fields
            .iter()
            .any(|f| matches!(f, VariationField::MinimumOrderQuantity(_))));

        r.drm = Some(true);
        r.minimum_quantity = Some(5);
        let fields = map_variation_fields(VariationType::DigitalDocument, &r, false);
        assert!(fields
            .iter()
            .any(|f| *f == VariationField::LicenseExpiration(LicenseExpiration::Unlimited)));
        assert!(!fields.iter().any(|f| matches!(f, VariationField::LicenseType(_))));
        assert!(fields
            .iter()
            .any(|f| *f == VariationField::MinimumOrderQuantity(Some(5))));
    }

    #[test]
    fn kit_components_only_when_present() {
        let mut r = record("10", "Kit/Bundle");
        let fields = map_variation_fields(VariationType::Kit, &r, false);
        assert!(!fields.iter().any(|f| matches!(f, VariationField::KitComponents(_))));
        r.product_components = Some(vec![
            syncdb_types::catalog::ProductRef {
                product_id: Some("1".to_string()),
            },
            syncdb_types::catalog::ProductRef { product_id: None },
        ]);
        let fields = map_variation_fields(VariationType::Kit, &r, false);
        assert!(fields
            .iter()
            .any(|f| *f == VariationField::KitComponents(vec!["1".to_string()])));
    }

    #[test]
    fn normalizes_tags() {
        assert_eq!(normalized_product_format(Some("DVD")), "dvd");
        assert_eq!(normalized_product_format(Some("Download Item")), "download");
        assert_eq!(normalized_product_format(Some("Kit/Bundle")), "");
        assert_eq!(normalized_item_type(Some("Service")), "service");
        assert_eq!(normalized_item_type(None), "");
        assert_eq!(truncate_date(Some("2020-01-02T03:04:05")), Some("2020-01-02".to_string()));
        assert_eq!(truncate_date(Some("")), None);
    }
}
