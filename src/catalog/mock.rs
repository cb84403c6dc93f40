// Mock Responder
// Canned upstream payloads, consulted before the cache and the network.
// The fixture plate is always answered here so it never spends paid quota.

use serde_json::{json, Map, Value};

use super::envelope::CatalogMethod;

/// Plate that always resolves to the canned vehicle
pub const FIXTURE_PLATE: &str = "EB34033";

/// Parameter key carrying the plate in a plate lookup
pub const PLATE_PARAM: &str = "keySystemNumber";

/// Number of synthetic articles reported by a mocked listing
pub const MOCK_ARTICLE_COUNT: u64 = 12;

const MOCK_BRANDS: [(&str, u64); 3] = [("BOSCH", 30), ("MANN-FILTER", 4), ("TRW", 161)];

/// Normalise a registration plate the way lookups key it: uppercase, no whitespace
pub fn normalize_plate(plate: &str) -> String {
    plate
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MockResponder {
    mock_mode: bool,
}

impl MockResponder {
    pub fn new(mock_mode: bool) -> Self {
        Self { mock_mode }
    }

    pub fn mock_mode(&self) -> bool {
        self.mock_mode
    }

    /// Canned payload for this call, or `None` when it must go upstream
    pub fn respond(&self, method: CatalogMethod, params: &Map<String, Value>) -> Option<Value> {
        if method == CatalogMethod::VehiclesByPlate {
            let plate = params
                .get(PLATE_PARAM)
                .and_then(Value::as_str)
                .map(normalize_plate)
                .unwrap_or_default();
            if plate == FIXTURE_PLATE {
                return Some(fixture_vehicle_payload(FIXTURE_PLATE));
            }
        }

        if !self.mock_mode {
            return None;
        }

        Some(match method {
            CatalogMethod::VehiclesByPlate => {
                let plate = params
                    .get(PLATE_PARAM)
                    .and_then(Value::as_str)
                    .map(normalize_plate)
                    .unwrap_or_default();
                fixture_vehicle_payload(&plate)
            }
            CatalogMethod::Articles => mock_article_list(params),
            CatalogMethod::ArticleDetail => mock_article_detail(params),
            CatalogMethod::AssemblyGroups => mock_assembly_groups(),
        })
    }
}

fn fixture_vehicle_payload(plate: &str) -> Value {
    json!({
        "status": 200,
        "data": {
            "array": [{
                "carId": 19942,
                "manuId": 121,
                "manuName": "VOLKSWAGEN",
                "modelId": 11542,
                "modelName": "GOLF VII (5G1, BQ1, BE1, BE2)",
                "typeName": "1.6 TDI",
                "yearOfConstrFrom": 201208,
                "yearOfConstrTo": 202012,
                "fuelType": "Diesel",
                "powerKwFrom": 77,
                "motorCode": "CLHA",
                "numberPlate": plate
            }]
        }
    })
}

fn param_u64(params: &Map<String, Value>, key: &str) -> u64 {
    match params.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Array(items)) => items.first().and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    }
}

fn mock_article(index: u64, group: u64, vehicle: u64) -> Value {
    let (brand, supplier) = MOCK_BRANDS[(index % MOCK_BRANDS.len() as u64) as usize];
    json!({
        "articleNumber": format!("MOCK-{group}-{vehicle}-{index:03}"),
        "dataSupplierId": supplier,
        "mfrName": brand,
        "genericArticles": [{"genericArticleDescription": "Mock Part"}],
        "price": {"amount": 100.0 + (index as f64) * 25.0, "currency": "NOK"},
        "articleCriteria": [],
        "images": [],
        "gtins": []
    })
}

fn mock_article_list(params: &Map<String, Value>) -> Value {
    let vehicle = param_u64(params, "linkageTargetId");
    let group = param_u64(params, "assemblyGroupNodeIds");
    let articles: Vec<Value> = (0..MOCK_ARTICLE_COUNT)
        .map(|i| mock_article(i, group, vehicle))
        .collect();

    json!({
        "status": 200,
        "totalMatchingArticles": MOCK_ARTICLE_COUNT,
        "articles": articles
    })
}

fn mock_article_detail(params: &Map<String, Value>) -> Value {
    let number = params
        .get("articleNumber")
        .and_then(Value::as_str)
        .unwrap_or("MOCK-0")
        .to_string();
    let brand_id = param_u64(params, "brandId");
    let brand = MOCK_BRANDS
        .iter()
        .find(|(_, id)| *id == brand_id)
        .map_or("MOCK", |(name, _)| *name);

    json!({
        "status": 200,
        "data": {
            "array": [{
                "articleNumber": number,
                "dataSupplierId": brand_id,
                "mfrName": brand,
                "genericArticles": [{"genericArticleDescription": "Mock Part"}],
                "price": {"amount": 499.0, "currency": "NOK"},
                "articleCriteria": [
                    {"criteriaDescription": "Fitting Position", "formattedValue": "Front Axle"},
                    {"criteriaDescription": "Weight [kg]", "formattedValue": "1.2"}
                ],
                "images": [{"imageURL800": format!("https://mock.invalid/{number}.jpg")}],
                "gtins": ["4047024000000"]
            }]
        }
    })
}

fn mock_assembly_groups() -> Value {
    json!({
        "status": 200,
        "data": {
            "array": [
                {"assemblyGroupNodeId": 100001, "assemblyGroupName": "Brake System", "hasChilds": true},
                {"assemblyGroupNodeId": 100032, "assemblyGroupName": "Brake Disc", "parentNodeId": 100001, "hasChilds": false},
                {"assemblyGroupNodeId": 100033, "assemblyGroupName": "Brake Pad", "parentNodeId": 100001, "hasChilds": false},
                {"assemblyGroupNodeId": 100002, "assemblyGroupName": "Filters", "hasChilds": true},
                {"assemblyGroupNodeId": 100259, "assemblyGroupName": "Oil Filter", "parentNodeId": 100002, "hasChilds": false},
                {"assemblyGroupNodeId": 100260, "assemblyGroupName": "Air Filter", "parentNodeId": 100002, "hasChilds": false}
            ]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::CatalogResponse;

    fn plate_params(plate: &str) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert(PLATE_PARAM.to_string(), json!(plate));
        params
    }

    #[test]
    fn test_fixture_plate_answered_without_mock_mode() {
        let responder = MockResponder::new(false);
        let payload = responder
            .respond(CatalogMethod::VehiclesByPlate, &plate_params("eb 34033"))
            .expect("fixture plate is always mocked");
        let CatalogResponse::Vehicles(vehicles) =
            CatalogResponse::parse(CatalogMethod::VehiclesByPlate, &payload).expect("parse")
        else {
            panic!("expected vehicles");
        };
        assert_eq!(vehicles[0].plate, FIXTURE_PLATE);
        assert_eq!(vehicles[0].manufacturer_name, "VOLKSWAGEN");
    }

    #[test]
    fn test_other_calls_pass_through_without_mock_mode() {
        let responder = MockResponder::new(false);
        assert!(responder
            .respond(CatalogMethod::VehiclesByPlate, &plate_params("AB12345"))
            .is_none());
        assert!(responder
            .respond(CatalogMethod::Articles, &Map::new())
            .is_none());
    }

    #[test]
    fn test_mock_mode_answers_every_method() {
        let responder = MockResponder::new(true);
        for method in CatalogMethod::ALL {
            let payload = responder
                .respond(method, &Map::new())
                .expect("mock mode answers");
            assert!(CatalogResponse::parse(method, &payload).is_ok(), "{method}");
        }
    }

    #[test]
    fn test_mock_articles_are_deterministic() {
        let responder = MockResponder::new(true);
        let mut params = Map::new();
        params.insert("linkageTargetId".to_string(), json!(19942));
        params.insert("assemblyGroupNodeIds".to_string(), json!(100032));

        let first = responder.respond(CatalogMethod::Articles, &params);
        let second = responder.respond(CatalogMethod::Articles, &params);
        assert_eq!(first, second);
        assert_eq!(
            first.expect("payload")["articles"][0]["articleNumber"],
            json!("MOCK-100032-19942-000")
        );
    }

    #[test]
    fn test_normalize_plate() {
        assert_eq!(normalize_plate(" eb 340 33 "), "EB34033");
    }
}
