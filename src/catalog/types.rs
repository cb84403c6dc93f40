// Typed projections of upstream catalog responses
// Upstream shapes are parsed here once; everything past this point works with
// concrete records instead of probing JSON.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::envelope::CatalogMethod;
use super::errors::CatalogError;

/// Vehicle as returned by a plate lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub vehicle_id: u64,
    pub manufacturer_id: u64,
    pub manufacturer_name: String,
    pub model_id: u64,
    pub model_name: String,
    pub type_name: String,
    pub year_from: u32,
    pub year_to: u32,
    pub fuel_type: String,
    pub power_kw: u32,
    pub engine_code: String,
    pub plate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticlePrice {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleAttribute {
    pub name: String,
    pub value: String,
}

/// Article as returned by listing or detail calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub article_number: String,
    pub data_supplier_id: u64,
    pub manufacturer_name: String,
    pub generic_article_description: String,
    pub price: Option<ArticlePrice>,
    pub attributes: Vec<ArticleAttribute>,
    pub images: Vec<String>,
    pub gtins: Vec<String>,
    /// Set once the record has been replaced by its detail lookup
    pub detailed: bool,
}

/// One page of an article listing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArticlePage {
    pub total_matching: u64,
    pub articles: Vec<ArticleRecord>,
}

/// Flat assembly-group node as upstream reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyGroupNode {
    pub node_id: u64,
    pub name: String,
    pub parent_id: Option<u64>,
    pub has_children: bool,
}

/// Node plus its resolved children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyGroupBranch {
    #[serde(flatten)]
    pub node: AssemblyGroupNode,
    pub children: Vec<AssemblyGroupBranch>,
}

/// Assembly-group hierarchy for one vehicle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyGroupTree {
    pub roots: Vec<AssemblyGroupBranch>,
}

impl AssemblyGroupTree {
    /// Build the hierarchy from the flat upstream list.
    /// Nodes whose parent is missing from the list become roots; sibling order follows upstream.
    /// A parent-link cycle is broken at its earliest node, which becomes a root.
    pub fn from_nodes(nodes: Vec<AssemblyGroupNode>) -> Self {
        let known: HashSet<u64> = nodes.iter().map(|n| n.node_id).collect();
        let position: HashMap<u64, usize> = nodes
            .iter()
            .enumerate()
            .rev()
            .map(|(index, n)| (n.node_id, index))
            .collect();
        let mut children: HashMap<u64, Vec<AssemblyGroupNode>> = HashMap::new();
        let mut roots = Vec::new();

        for node in nodes {
            match node.parent_id {
                Some(parent) if known.contains(&parent) && parent != node.node_id => {
                    children.entry(parent).or_default().push(node);
                }
                _ => roots.push(node),
            }
        }

        fn attach(
            node: AssemblyGroupNode,
            children: &mut HashMap<u64, Vec<AssemblyGroupNode>>,
        ) -> AssemblyGroupBranch {
            let kids = children.remove(&node.node_id).unwrap_or_default();
            AssemblyGroupBranch {
                node,
                children: kids.into_iter().map(|k| attach(k, children)).collect(),
            }
        }

        let mut branches: Vec<AssemblyGroupBranch> = roots
            .into_iter()
            .map(|root| attach(root, &mut children))
            .collect();

        // Whatever is left was never reached from a root
        loop {
            let earliest = children
                .iter()
                .flat_map(|(parent, kids)| {
                    kids.iter()
                        .enumerate()
                        .map(move |(slot, kid)| (*parent, slot, kid.node_id))
                })
                .min_by_key(|(_, _, node_id)| position.get(node_id).copied().unwrap_or(usize::MAX))
                .map(|(parent, slot, _)| (parent, slot));
            let Some((parent, slot)) = earliest else {
                break;
            };
            let Some(kids) = children.get_mut(&parent) else {
                break;
            };
            let node = kids.remove(slot);
            if kids.is_empty() {
                children.remove(&parent);
            }
            branches.push(attach(node, &mut children));
        }

        Self { roots: branches }
    }

    pub fn node_count(&self) -> usize {
        fn count(branch: &AssemblyGroupBranch) -> usize {
            1 + branch.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }
}

/// Sort articles for display: manufacturer name, then article number, ascending
pub fn sort_for_display(articles: &mut [ArticleRecord]) {
    articles.sort_by(|a, b| {
        a.manufacturer_name
            .cmp(&b.manufacturer_name)
            .then_with(|| a.article_number.cmp(&b.article_number))
    });
}

/// Per-method typed response
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogResponse {
    Vehicles(Vec<VehicleRecord>),
    Articles(ArticlePage),
    ArticleDetail(Option<ArticleRecord>),
    AssemblyGroups(Vec<AssemblyGroupNode>),
}

impl CatalogResponse {
    /// Validate a raw payload against the shape `method` promises.
    /// `data`-wrapped methods and the top-level `articles` listing are special-cased here.
    pub fn parse(method: CatalogMethod, payload: &Value) -> Result<Self, CatalogError> {
        match method {
            CatalogMethod::VehiclesByPlate => {
                let wire: Vec<WireVehicle> = data_array(method, payload)?;
                Ok(Self::Vehicles(wire.into_iter().map(Into::into).collect()))
            }
            CatalogMethod::Articles => {
                let wire: WireArticlePage = serde_json::from_value(payload.clone())
                    .map_err(|e| CatalogError::shape(method, e.to_string()))?;
                let articles: Vec<ArticleRecord> =
                    wire.articles.into_iter().map(Into::into).collect();
                let total_matching = wire
                    .total_matching_articles
                    .unwrap_or(articles.len() as u64);
                Ok(Self::Articles(ArticlePage {
                    total_matching,
                    articles,
                }))
            }
            CatalogMethod::ArticleDetail => {
                let wire: Vec<WireArticle> = data_array(method, payload)?;
                Ok(Self::ArticleDetail(wire.into_iter().next().map(Into::into)))
            }
            CatalogMethod::AssemblyGroups => {
                let wire: Vec<WireAssemblyGroup> = data_array(method, payload)?;
                Ok(Self::AssemblyGroups(
                    wire.into_iter().map(Into::into).collect(),
                ))
            }
        }
    }

    pub fn method(&self) -> CatalogMethod {
        match self {
            CatalogResponse::Vehicles(_) => CatalogMethod::VehiclesByPlate,
            CatalogResponse::Articles(_) => CatalogMethod::Articles,
            CatalogResponse::ArticleDetail(_) => CatalogMethod::ArticleDetail,
            CatalogResponse::AssemblyGroups(_) => CatalogMethod::AssemblyGroups,
        }
    }
}

/// `data.array` of a data-wrapped response. A missing or null `data`/`array`
/// means no results; anything else that is not an array is a shape error.
fn data_array<T: serde::de::DeserializeOwned>(
    method: CatalogMethod,
    payload: &Value,
) -> Result<Vec<T>, CatalogError> {
    let Some(object) = payload.as_object() else {
        return Err(CatalogError::shape(method, "response is not a JSON object"));
    };

    let array = match object.get("data") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        // Upstream sends an empty string for "no data" on some methods
        Some(Value::String(s)) if s.is_empty() => return Ok(Vec::new()),
        Some(Value::Object(data)) => match data.get("array") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(array) => array,
        },
        Some(_) => return Err(CatalogError::shape(method, "`data` is not an object")),
    };

    if !array.is_array() {
        return Err(CatalogError::shape(method, "`data.array` is not an array"));
    }

    serde_json::from_value(array.clone()).map_err(|e| CatalogError::shape(method, e.to_string()))
}

// Upstream wire shapes. Every field is optional upstream and defaults when
// absent or null.

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireVehicle {
    #[serde(deserialize_with = "null_as_default")]
    car_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    manu_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    manu_name: String,
    #[serde(deserialize_with = "null_as_default")]
    model_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    model_name: String,
    #[serde(deserialize_with = "null_as_default")]
    type_name: String,
    #[serde(deserialize_with = "null_as_default")]
    year_of_constr_from: u32,
    #[serde(deserialize_with = "null_as_default")]
    year_of_constr_to: u32,
    #[serde(deserialize_with = "null_as_default")]
    fuel_type: String,
    #[serde(deserialize_with = "null_as_default")]
    power_kw_from: u32,
    #[serde(deserialize_with = "null_as_default")]
    motor_code: String,
    #[serde(deserialize_with = "null_as_default")]
    number_plate: String,
}

impl From<WireVehicle> for VehicleRecord {
    fn from(w: WireVehicle) -> Self {
        Self {
            vehicle_id: w.car_id,
            manufacturer_id: w.manu_id,
            manufacturer_name: w.manu_name,
            model_id: w.model_id,
            model_name: w.model_name,
            type_name: w.type_name,
            year_from: w.year_of_constr_from,
            year_to: w.year_of_constr_to,
            fuel_type: w.fuel_type,
            power_kw: w.power_kw_from,
            engine_code: w.motor_code,
            plate: w.number_plate,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireArticlePage {
    total_matching_articles: Option<u64>,
    #[serde(deserialize_with = "null_as_default")]
    articles: Vec<WireArticle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireArticle {
    #[serde(deserialize_with = "null_as_default")]
    article_number: String,
    #[serde(deserialize_with = "null_as_default")]
    data_supplier_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    mfr_name: String,
    #[serde(deserialize_with = "null_as_default")]
    generic_articles: Vec<WireGenericArticle>,
    price: Option<WirePrice>,
    #[serde(deserialize_with = "null_as_default")]
    article_criteria: Vec<WireCriterion>,
    #[serde(deserialize_with = "null_as_default")]
    images: Vec<WireImage>,
    #[serde(deserialize_with = "null_as_default")]
    gtins: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireGenericArticle {
    #[serde(deserialize_with = "null_as_default")]
    generic_article_description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePrice {
    #[serde(deserialize_with = "null_as_default")]
    amount: f64,
    #[serde(deserialize_with = "null_as_default")]
    currency: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireCriterion {
    #[serde(deserialize_with = "null_as_default")]
    criteria_description: String,
    #[serde(deserialize_with = "null_as_default")]
    formatted_value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireImage {
    #[serde(rename = "imageURL800")]
    image_url_800: Option<String>,
    #[serde(rename = "imageURL400")]
    image_url_400: Option<String>,
}

impl From<WireArticle> for ArticleRecord {
    fn from(w: WireArticle) -> Self {
        Self {
            article_number: w.article_number,
            data_supplier_id: w.data_supplier_id,
            manufacturer_name: w.mfr_name,
            generic_article_description: w
                .generic_articles
                .into_iter()
                .next()
                .map(|g| g.generic_article_description)
                .unwrap_or_default(),
            price: w.price.map(|p| ArticlePrice {
                amount: p.amount,
                currency: p.currency,
            }),
            attributes: w
                .article_criteria
                .into_iter()
                .map(|c| ArticleAttribute {
                    name: c.criteria_description,
                    value: c.formatted_value,
                })
                .collect(),
            images: w
                .images
                .into_iter()
                .filter_map(|i| i.image_url_800.or(i.image_url_400))
                .collect(),
            gtins: w.gtins,
            detailed: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireAssemblyGroup {
    #[serde(deserialize_with = "null_as_default")]
    assembly_group_node_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    assembly_group_name: String,
    parent_node_id: Option<u64>,
    #[serde(deserialize_with = "null_as_default")]
    has_childs: bool,
}

impl From<WireAssemblyGroup> for AssemblyGroupNode {
    fn from(w: WireAssemblyGroup) -> Self {
        Self {
            node_id: w.assembly_group_node_id,
            name: w.assembly_group_name,
            parent_id: w.parent_node_id,
            has_children: w.has_childs,
        }
    }
}
