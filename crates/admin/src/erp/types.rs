//! Typed ERP records and their wire formats.
//!
//! Every payload is decoded into a private wire struct that mirrors the
//! ERP's JSON (Portuguese field names, everything optional) and converted
//! into a domain record with defaults applied. Nothing loosely typed leaves
//! this module.

use bytes::Bytes;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vitrine_core::{ErpId, ListingFormat, Sku};

use crate::catalog::{ExternalListingItem, attribute_pairs};

// =============================================================================
// Domain records
// =============================================================================

/// A product or variation as returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub id: ErpId,
    pub name: String,
    pub sku: Option<Sku>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub format: ListingFormat,
    pub is_active: bool,
    pub gtin: Option<String>,
    pub brand: Option<String>,
    pub unit: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub width_cm: Option<Decimal>,
    pub height_cm: Option<Decimal>,
    pub depth_cm: Option<Decimal>,
    pub category_id: Option<ErpId>,
    /// Available stock for products without variations.
    pub stock: Option<i32>,
    /// Image URLs in display order, internal uploads first.
    pub image_urls: Vec<String>,
    /// Set when this record is a variation of another product.
    pub parent_id: Option<ErpId>,
    /// Raw attribute string of a variation record (`Cor:Preto;Tamanho:37`).
    pub variation_name: Option<String>,
    pub variations: Vec<ErpVariation>,
    /// Operator-defined fields, name and value.
    pub custom_fields: Vec<(String, String)>,
}

impl ProductDetail {
    /// The parent id when this record is a variation of a different product.
    #[must_use]
    pub fn redirect_parent(&self) -> Option<ErpId> {
        self.parent_id.filter(|parent| *parent != self.id)
    }
}

/// One variation nested in a parent's detail record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErpVariation {
    pub id: ErpId,
    pub name: String,
    pub sku: Option<Sku>,
    pub price: Option<Decimal>,
    pub is_active: bool,
    pub stock: Option<i32>,
    /// Structured attributes parsed from the variation's attribute string.
    pub attributes: Vec<(String, String)>,
}

/// Stock balance of one product or variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockBalance {
    pub product_id: ErpId,
    pub physical: i32,
    /// Sellable quantity (physical minus reservations).
    pub available: i32,
}

/// An image fetched from the ERP's media list.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

// =============================================================================
// Wire formats
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingRowWire {
    id: i64,
    #[serde(default)]
    nome: String,
    #[serde(default)]
    formato: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ProductDetailWire {
    id: i64,
    nome: String,
    codigo: Option<String>,
    preco: Option<Decimal>,
    preco_promocional: Option<Decimal>,
    descricao_curta: Option<String>,
    descricao_complementar: Option<String>,
    formato: Option<String>,
    situacao: Option<String>,
    gtin: Option<String>,
    marca: Option<String>,
    unidade: Option<String>,
    peso_bruto: Option<Decimal>,
    dimensoes: Option<DimensionsWire>,
    categoria: Option<IdRefWire>,
    estoque: Option<StockWire>,
    midia: Option<MediaWire>,
    variacao: Option<VariationInfoWire>,
    variacoes: Vec<VariationWire>,
    campos_customizados: Vec<CustomFieldWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DimensionsWire {
    largura: Option<Decimal>,
    altura: Option<Decimal>,
    profundidade: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct IdRefWire {
    id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StockWire {
    saldo_virtual_total: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MediaWire {
    imagens: ImagesWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImagesWire {
    internas: Vec<ImageLinkWire>,
    externas: Vec<ImageLinkWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImageLinkWire {
    link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VariationInfoWire {
    nome: Option<String>,
    produto_pai: Option<IdRefWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VariationWire {
    id: i64,
    nome: String,
    codigo: Option<String>,
    preco: Option<Decimal>,
    situacao: Option<String>,
    estoque: Option<StockWire>,
    variacao: Option<VariationInfoWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CustomFieldWire {
    nome: Option<String>,
    valor: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StockBalanceWire {
    produto: IdRefWire,
    #[serde(default)]
    saldo_fisico_total: Option<f64>,
    #[serde(default)]
    saldo_virtual_total: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryWire {
    #[serde(default)]
    descricao: Option<String>,
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ListingRowWire> for ExternalListingItem {
    fn from(row: ListingRowWire) -> Self {
        Self {
            external_id: ErpId::new(row.id),
            raw_name: row.nome.trim().to_string(),
            format: parse_format(row.formato.as_deref()),
        }
    }
}

impl From<ProductDetailWire> for ProductDetail {
    fn from(wire: ProductDetailWire) -> Self {
        let dimensions = wire.dimensoes.unwrap_or_default();
        let images = wire.midia.unwrap_or_default().imagens;
        let image_urls = images
            .internas
            .into_iter()
            .chain(images.externas)
            .filter_map(|img| non_empty(img.link))
            .collect();
        let (variation_name, parent_id) = wire.variacao.map_or((None, None), |v| {
            (
                non_empty(v.nome),
                v.produto_pai.map(|p| p.id).filter(|&id| id > 0).map(ErpId::new),
            )
        });

        Self {
            id: ErpId::new(wire.id),
            name: wire.nome.trim().to_string(),
            sku: Sku::from_optional(wire.codigo.as_deref()),
            price: wire.preco.unwrap_or_default(),
            sale_price: wire.preco_promocional.filter(|p| *p > Decimal::ZERO),
            short_description: non_empty(wire.descricao_curta),
            description: non_empty(wire.descricao_complementar),
            format: parse_format(wire.formato.as_deref()),
            is_active: parse_active(wire.situacao.as_deref()),
            gtin: non_empty(wire.gtin),
            brand: non_empty(wire.marca),
            unit: non_empty(wire.unidade),
            weight_kg: positive(wire.peso_bruto),
            width_cm: positive(dimensions.largura),
            height_cm: positive(dimensions.altura),
            depth_cm: positive(dimensions.profundidade),
            category_id: wire.categoria.map(|c| c.id).filter(|&id| id > 0).map(ErpId::new),
            stock: wire.estoque.and_then(|s| s.saldo_virtual_total).map(quantity),
            image_urls,
            parent_id,
            variation_name,
            variations: wire.variacoes.into_iter().map(ErpVariation::from).collect(),
            custom_fields: wire
                .campos_customizados
                .into_iter()
                .filter_map(|field| {
                    let name = non_empty(field.nome)?;
                    let value = match field.valor? {
                        serde_json::Value::String(s) => non_empty(Some(s))?,
                        serde_json::Value::Null => return None,
                        other => other.to_string(),
                    };
                    Some((name, value))
                })
                .collect(),
        }
    }
}

impl From<VariationWire> for ErpVariation {
    fn from(wire: VariationWire) -> Self {
        let attributes = wire
            .variacao
            .and_then(|v| v.nome)
            .map(|raw| attribute_pairs(&raw))
            .unwrap_or_default();

        Self {
            id: ErpId::new(wire.id),
            name: wire.nome.trim().to_string(),
            sku: Sku::from_optional(wire.codigo.as_deref()),
            price: wire.preco.filter(|p| *p > Decimal::ZERO),
            is_active: parse_active(wire.situacao.as_deref()),
            stock: wire.estoque.and_then(|s| s.saldo_virtual_total).map(quantity),
            attributes,
        }
    }
}

impl From<StockBalanceWire> for StockBalance {
    fn from(wire: StockBalanceWire) -> Self {
        Self {
            product_id: ErpId::new(wire.produto.id),
            physical: wire.saldo_fisico_total.map_or(0, quantity),
            available: wire.saldo_virtual_total.map_or(0, quantity),
        }
    }
}

impl CategoryWire {
    pub(crate) fn into_name(self) -> Option<String> {
        non_empty(self.descricao)
    }
}

/// `V` is the ERP's "with variations" format; simple (`S`) and composite
/// (`E`) products have none.
fn parse_format(raw: Option<&str>) -> ListingFormat {
    match raw.map(str::trim) {
        Some(f) if f.eq_ignore_ascii_case("V") => ListingFormat::Variation,
        _ => ListingFormat::Simple,
    }
}

/// `I` (inactive) and `E` (excluded) are the only inactive states.
fn parse_active(raw: Option<&str>) -> bool {
    !matches!(raw.map(str::trim), Some("I" | "i" | "E" | "e"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| *v > Decimal::ZERO)
}

/// ERP balances are fractional; the catalog stores whole, non-negative units.
#[allow(clippy::cast_possible_truncation)] // clamped to i32 range first
pub(crate) fn quantity(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    value.floor().clamp(0.0, f64::from(i32::MAX)) as i32
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn decode_detail(json: &str) -> ProductDetail {
        let envelope: DataEnvelope<ProductDetailWire> = serde_json::from_str(json).unwrap();
        envelope.data.into()
    }

    #[test]
    fn test_listing_row() {
        let envelope: DataEnvelope<Vec<ListingRowWire>> = serde_json::from_str(
            r#"{"data":[
                {"id":501,"nome":"Sandália Laura ","codigo":"SL","formato":"V"},
                {"id":2000,"nome":"Tênis Max","formato":"S"},
                {"id":3000,"nome":"Kit Presente","formato":"E"}
            ]}"#,
        )
        .unwrap();
        let items: Vec<ExternalListingItem> = envelope.data.into_iter().map(Into::into).collect();

        assert_eq!(items[0].raw_name, "Sandália Laura");
        assert_eq!(items[0].format, ListingFormat::Variation);
        assert_eq!(items[1].format, ListingFormat::Simple);
        assert_eq!(items[2].format, ListingFormat::Simple);
    }

    #[test]
    fn test_parent_detail_with_variations() {
        let detail = decode_detail(
            r#"{"data":{
                "id":501,"nome":"Sandália Laura","codigo":"SL-501","preco":189.9,
                "precoPromocional":0,"formato":"V","situacao":"A","marca":"Vitrine",
                "unidade":"PAR","pesoBruto":0.45,
                "dimensoes":{"largura":12,"altura":10.5,"profundidade":30},
                "categoria":{"id":77},
                "midia":{"imagens":{
                    "internas":[{"link":"https://cdn.erp/1.jpg?sig=abc"}],
                    "externas":[{"link":""},{"link":"https://img.example/2.png"}]
                }},
                "variacoes":[
                    {"id":1001,"nome":"Sandália Laura Cor:Preto","codigo":"SL-PT","preco":189.9,
                     "situacao":"A","estoque":{"saldoVirtualTotal":4.0},
                     "variacao":{"nome":"Cor:Preto;Tamanho:37","produtoPai":{"id":501}}},
                    {"id":1002,"nome":"Sandália Laura Cor:Branco","situacao":"I",
                     "variacao":{"nome":"Cor:Branco"}}
                ]
            }}"#,
        );

        assert_eq!(detail.id, ErpId::new(501));
        assert_eq!(detail.price, Decimal::new(1899, 1));
        assert_eq!(detail.sale_price, None);
        assert_eq!(detail.format, ListingFormat::Variation);
        assert!(detail.is_active);
        assert_eq!(detail.category_id, Some(ErpId::new(77)));
        assert_eq!(detail.weight_kg, Some(Decimal::new(45, 2)));
        assert_eq!(detail.height_cm, Some(Decimal::new(105, 1)));
        assert_eq!(
            detail.image_urls,
            vec!["https://cdn.erp/1.jpg?sig=abc", "https://img.example/2.png"]
        );
        assert_eq!(detail.redirect_parent(), None);

        assert_eq!(detail.variations.len(), 2);
        let preto = &detail.variations[0];
        assert_eq!(preto.sku.as_ref().map(Sku::as_str), Some("SL-PT"));
        assert_eq!(preto.stock, Some(4));
        assert_eq!(
            preto.attributes,
            vec![
                ("cor".to_string(), "Preto".to_string()),
                ("tamanho".to_string(), "37".to_string())
            ]
        );
        assert!(!detail.variations[1].is_active);
        assert_eq!(detail.variations[1].price, None);
    }

    #[test]
    fn test_variation_detail_points_to_parent() {
        let detail = decode_detail(
            r#"{"data":{"id":1001,"nome":"Sandália Laura Cor:Preto","formato":"S",
                "variacao":{"nome":"Cor:Preto","produtoPai":{"id":501}}}}"#,
        );
        assert_eq!(detail.redirect_parent(), Some(ErpId::new(501)));
        assert_eq!(detail.variation_name.as_deref(), Some("Cor:Preto"));
    }

    #[test]
    fn test_minimal_detail_defaults() {
        let detail = decode_detail(r#"{"data":{"id":9,"nome":" Tênis Max "}}"#);
        assert_eq!(detail.name, "Tênis Max");
        assert_eq!(detail.price, Decimal::ZERO);
        assert!(detail.is_active);
        assert!(detail.variations.is_empty());
        assert!(detail.image_urls.is_empty());
        assert_eq!(detail.sku, None);
        assert_eq!(detail.stock, None);
    }

    #[test]
    fn test_custom_fields() {
        let detail = decode_detail(
            r#"{"data":{"id":9,"nome":"Bolsa","camposCustomizados":[
                {"nome":"Material","valor":"Couro"},
                {"nome":"Alça","valor":60},
                {"nome":"Vazio","valor":""},
                {"valor":"sem nome"}
            ]}}"#,
        );
        assert_eq!(
            detail.custom_fields,
            vec![
                ("Material".to_string(), "Couro".to_string()),
                ("Alça".to_string(), "60".to_string())
            ]
        );
    }

    #[test]
    fn test_stock_balance() {
        let envelope: DataEnvelope<Vec<StockBalanceWire>> = serde_json::from_str(
            r#"{"data":[
                {"produto":{"id":1001},"saldoFisicoTotal":5.0,"saldoVirtualTotal":3.0},
                {"produto":{"id":1002},"saldoFisicoTotal":-2.5}
            ]}"#,
        )
        .unwrap();
        let balances: Vec<StockBalance> = envelope.data.into_iter().map(Into::into).collect();
        assert_eq!(balances[0].available, 3);
        assert_eq!(balances[0].physical, 5);
        assert_eq!(balances[1].physical, 0);
        assert_eq!(balances[1].available, 0);
    }

    #[test]
    fn test_quantity_clamps() {
        assert_eq!(quantity(2.9), 2);
        assert_eq!(quantity(-1.0), 0);
        assert_eq!(quantity(f64::NAN), 0);
        assert_eq!(quantity(1e12), i32::MAX);
    }
}
