use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{FieldError, ValidationError};
use crate::models::record::{Cell, Record};

/// Wire names of the request fields, also used as the raw column names of
/// the record handed to the pipeline.
pub mod field {
    pub const ID: &str = "ID";
    pub const DELIVERY_PERSON_ID: &str = "Delivery_person_ID";
    pub const DELIVERY_PERSON_AGE: &str = "Delivery_person_Age";
    pub const DELIVERY_PERSON_RATINGS: &str = "Delivery_person_Ratings";
    pub const RESTAURANT_LATITUDE: &str = "Restaurant_latitude";
    pub const RESTAURANT_LONGITUDE: &str = "Restaurant_longitude";
    pub const DELIVERY_LOCATION_LATITUDE: &str = "Delivery_location_latitude";
    pub const DELIVERY_LOCATION_LONGITUDE: &str = "Delivery_location_longitude";
    pub const ORDER_DATE: &str = "Order_Date";
    pub const TIME_ORDERD: &str = "Time_Orderd";
    pub const TIME_ORDER_PICKED: &str = "Time_Order_picked";
    pub const WEATHERCONDITIONS: &str = "Weatherconditions";
    pub const ROAD_TRAFFIC_DENSITY: &str = "Road_traffic_density";
    pub const VEHICLE_CONDITION: &str = "Vehicle_condition";
    pub const TYPE_OF_ORDER: &str = "Type_of_order";
    pub const TYPE_OF_VEHICLE: &str = "Type_of_vehicle";
    pub const MULTIPLE_DELIVERIES: &str = "multiple_deliveries";
    pub const FESTIVAL: &str = "Festival";
    pub const CITY: &str = "City";
}

/// A validated delivery order. Immutable once built; the pipeline works on
/// the [`Record`] produced by [`DeliveryRequest::to_record`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryRequest {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Delivery_person_ID")]
    pub delivery_person_id: String,
    #[serde(rename = "Delivery_person_Age")]
    pub delivery_person_age: String,
    #[serde(rename = "Delivery_person_Ratings")]
    pub delivery_person_ratings: String,
    #[serde(rename = "Restaurant_latitude")]
    pub restaurant_latitude: f64,
    #[serde(rename = "Restaurant_longitude")]
    pub restaurant_longitude: f64,
    #[serde(rename = "Delivery_location_latitude")]
    pub delivery_location_latitude: f64,
    #[serde(rename = "Delivery_location_longitude")]
    pub delivery_location_longitude: f64,
    #[serde(rename = "Order_Date")]
    pub order_date: String,
    #[serde(rename = "Time_Orderd")]
    pub time_orderd: String,
    #[serde(rename = "Time_Order_picked")]
    pub time_order_picked: String,
    #[serde(rename = "Weatherconditions")]
    pub weatherconditions: String,
    #[serde(rename = "Road_traffic_density")]
    pub road_traffic_density: String,
    #[serde(rename = "Vehicle_condition")]
    pub vehicle_condition: i64,
    #[serde(rename = "Type_of_order")]
    pub type_of_order: String,
    #[serde(rename = "Type_of_vehicle")]
    pub type_of_vehicle: String,
    #[serde(rename = "multiple_deliveries")]
    pub multiple_deliveries: String,
    #[serde(rename = "Festival")]
    pub festival: String,
    #[serde(rename = "City")]
    pub city: String,
}

impl DeliveryRequest {
    /// Parses a raw request body, reporting every offending field at once.
    pub fn from_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| ValidationError {
            errors: vec![FieldError::body(
                "json_invalid",
                format!("JSON decode error: {}", e),
            )],
        })?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or_else(|| ValidationError {
            errors: vec![FieldError::body(
                "model_type",
                "Input should be a valid dictionary or object",
            )],
        })?;

        let mut v = FieldReader::new(obj);

        let id = v.string(field::ID);
        let delivery_person_id = v.string(field::DELIVERY_PERSON_ID);
        let delivery_person_age = v.string(field::DELIVERY_PERSON_AGE);
        let delivery_person_ratings = v.string(field::DELIVERY_PERSON_RATINGS);
        let restaurant_latitude = v.float(field::RESTAURANT_LATITUDE);
        let restaurant_longitude = v.float(field::RESTAURANT_LONGITUDE);
        let delivery_location_latitude = v.float(field::DELIVERY_LOCATION_LATITUDE);
        let delivery_location_longitude = v.float(field::DELIVERY_LOCATION_LONGITUDE);
        let order_date = v.string(field::ORDER_DATE);
        let time_orderd = v.string(field::TIME_ORDERD);
        let time_order_picked = v.string(field::TIME_ORDER_PICKED);
        let weatherconditions = v.string(field::WEATHERCONDITIONS);
        let road_traffic_density = v.string(field::ROAD_TRAFFIC_DENSITY);
        let vehicle_condition = v.integer(field::VEHICLE_CONDITION);
        let type_of_order = v.string(field::TYPE_OF_ORDER);
        let type_of_vehicle = v.string(field::TYPE_OF_VEHICLE);
        let multiple_deliveries = v.string(field::MULTIPLE_DELIVERIES);
        let festival = v.string(field::FESTIVAL);
        let city = v.string(field::CITY);

        if !v.errors.is_empty() {
            return Err(ValidationError { errors: v.errors });
        }

        Ok(Self {
            id,
            delivery_person_id,
            delivery_person_age,
            delivery_person_ratings,
            restaurant_latitude,
            restaurant_longitude,
            delivery_location_latitude,
            delivery_location_longitude,
            order_date,
            time_orderd,
            time_order_picked,
            weatherconditions,
            road_traffic_density,
            vehicle_condition,
            type_of_order,
            type_of_vehicle,
            multiple_deliveries,
            festival,
            city,
        })
    }

    /// Raw single-row table keyed by wire field names. String fields stay
    /// text; coordinates and the vehicle code are numbers.
    pub fn to_record(&self) -> Record {
        Record::new()
            .with(field::ID, Cell::text(&self.id))
            .with(field::DELIVERY_PERSON_ID, Cell::text(&self.delivery_person_id))
            .with(field::DELIVERY_PERSON_AGE, Cell::text(&self.delivery_person_age))
            .with(field::DELIVERY_PERSON_RATINGS, Cell::text(&self.delivery_person_ratings))
            .with(field::RESTAURANT_LATITUDE, Cell::number(self.restaurant_latitude))
            .with(field::RESTAURANT_LONGITUDE, Cell::number(self.restaurant_longitude))
            .with(field::DELIVERY_LOCATION_LATITUDE, Cell::number(self.delivery_location_latitude))
            .with(field::DELIVERY_LOCATION_LONGITUDE, Cell::number(self.delivery_location_longitude))
            .with(field::ORDER_DATE, Cell::text(&self.order_date))
            .with(field::TIME_ORDERD, Cell::text(&self.time_orderd))
            .with(field::TIME_ORDER_PICKED, Cell::text(&self.time_order_picked))
            .with(field::WEATHERCONDITIONS, Cell::text(&self.weatherconditions))
            .with(field::ROAD_TRAFFIC_DENSITY, Cell::text(&self.road_traffic_density))
            .with(field::VEHICLE_CONDITION, Cell::number(self.vehicle_condition as f64))
            .with(field::TYPE_OF_ORDER, Cell::text(&self.type_of_order))
            .with(field::TYPE_OF_VEHICLE, Cell::text(&self.type_of_vehicle))
            .with(field::MULTIPLE_DELIVERIES, Cell::text(&self.multiple_deliveries))
            .with(field::FESTIVAL, Cell::text(&self.festival))
            .with(field::CITY, Cell::text(&self.city))
    }
}

/// Reads typed fields out of a JSON object, collecting errors instead of
/// stopping at the first one. A failed read returns a placeholder; callers
/// must check `errors` before using any value.
struct FieldReader<'a> {
    obj: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    fn new(obj: &'a Map<String, Value>) -> Self {
        Self {
            obj,
            errors: Vec::new(),
        }
    }

    fn present(&mut self, name: &str) -> Option<&'a Value> {
        let value = self.obj.get(name);
        if value.is_none() {
            self.errors.push(FieldError::new(name, "missing", "Field required"));
        }
        value
    }

    fn string(&mut self, name: &str) -> String {
        let parsed = match self.present(name) {
            None => return String::new(),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(("string_type", "Input should be a valid string")),
        };
        self.record(name, parsed)
    }

    fn float(&mut self, name: &str) -> f64 {
        let parsed = match self.present(name) {
            None => return 0.0,
            Some(Value::Number(n)) => n.as_f64().ok_or(("float_type", "Input should be a valid number")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or((
                    "float_parsing",
                    "Input should be a valid number, unable to parse string as a number",
                )),
            Some(Value::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
            Some(_) => Err(("float_type", "Input should be a valid number")),
        };
        self.record(name, parsed)
    }

    fn integer(&mut self, name: &str) -> i64 {
        let parsed = match self.present(name) {
            None => return 0,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => Ok(i),
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                    _ => Err((
                        "int_from_float",
                        "Input should be a valid integer, got a number with a fractional part",
                    )),
                },
            },
            Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| {
                (
                    "int_parsing",
                    "Input should be a valid integer, unable to parse string as an integer",
                )
            }),
            Some(Value::Bool(b)) => Ok(i64::from(*b)),
            Some(_) => Err(("int_type", "Input should be a valid integer")),
        };
        self.record(name, parsed)
    }

    fn record<T: Default>(&mut self, name: &str, parsed: Result<T, (&str, &str)>) -> T {
        match parsed {
            Ok(value) => value,
            Err((kind, msg)) => {
                self.errors.push(FieldError::new(name, kind, msg));
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "ID": "0x4607",
            "Delivery_person_ID": "INDORES13DEL02",
            "Delivery_person_Age": "37",
            "Delivery_person_Ratings": "4.9",
            "Restaurant_latitude": 22.745049,
            "Restaurant_longitude": 75.892471,
            "Delivery_location_latitude": 22.765049,
            "Delivery_location_longitude": 75.912471,
            "Order_Date": "19-03-2022",
            "Time_Orderd": "11:30:00",
            "Time_Order_picked": "11:45:00",
            "Weatherconditions": "conditions Sunny",
            "Road_traffic_density": "High ",
            "Vehicle_condition": 2,
            "Type_of_order": "Snack ",
            "Type_of_vehicle": "motorcycle ",
            "multiple_deliveries": "0",
            "Festival": "No ",
            "City": "Urban "
        })
    }

    #[test]
    fn test_valid_body_parses() {
        let request = DeliveryRequest::from_value(&valid_body()).unwrap();

        assert_eq!(request.id, "0x4607");
        assert_eq!(request.vehicle_condition, 2);
        assert_eq!(request.multiple_deliveries, "0");
        assert!((request.restaurant_latitude - 22.745049).abs() < 1e-9);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let mut body = valid_body();
        let obj = body.as_object_mut().unwrap();
        obj.remove("City");
        obj.remove("Festival");

        let err = DeliveryRequest::from_value(&body).unwrap_err();

        assert_eq!(err.fields(), vec!["Festival", "City"]);
        assert!(err.errors.iter().all(|e| e.kind == "missing"));
    }

    #[test]
    fn test_wrong_primitive_types_rejected() {
        let mut body = valid_body();
        let obj = body.as_object_mut().unwrap();
        obj.insert("Delivery_person_Age".into(), json!(29));
        obj.insert("Restaurant_latitude".into(), json!("north"));
        obj.insert("Vehicle_condition".into(), json!(1.5));

        let err = DeliveryRequest::from_value(&body).unwrap_err();

        let kinds: Vec<(&str, &str)> = err
            .errors
            .iter()
            .map(|e| (e.field().unwrap(), e.kind.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("Delivery_person_Age", "string_type"),
                ("Restaurant_latitude", "float_parsing"),
                ("Vehicle_condition", "int_from_float"),
            ]
        );
    }

    #[test]
    fn test_numeric_strings_accepted_for_coordinates_and_code() {
        let mut body = valid_body();
        let obj = body.as_object_mut().unwrap();
        obj.insert("Delivery_location_longitude".into(), json!("75.91"));
        obj.insert("Vehicle_condition".into(), json!("1"));

        let request = DeliveryRequest::from_value(&body).unwrap();

        assert_eq!(request.vehicle_condition, 1);
        assert!((request.delivery_location_longitude - 75.91).abs() < 1e-9);
    }

    #[test]
    fn test_booleans_accepted_as_numbers() {
        let mut body = valid_body();
        let obj = body.as_object_mut().unwrap();
        obj.insert("Vehicle_condition".into(), json!(true));
        obj.insert("Restaurant_latitude".into(), json!(false));

        let request = DeliveryRequest::from_value(&body).unwrap();

        assert_eq!(request.vehicle_condition, 1);
        assert_eq!(request.restaurant_latitude, 0.0);
    }

    #[test]
    fn test_non_object_and_invalid_json() {
        let err = DeliveryRequest::from_value(&json!([1, 2])).unwrap_err();
        assert_eq!(err.errors[0].kind, "model_type");

        let err = DeliveryRequest::from_slice(b"{not json").unwrap_err();
        assert_eq!(err.errors[0].kind, "json_invalid");
        assert_eq!(err.errors[0].loc, vec!["body".to_string()]);
    }

    #[test]
    fn test_record_keeps_raw_strings() {
        let request = DeliveryRequest::from_value(&valid_body()).unwrap();
        let record = request.to_record();

        assert_eq!(record.len(), 19);
        assert_eq!(record.get("Delivery_person_Age"), Some(&Cell::text("37")));
        assert_eq!(record.get("Vehicle_condition"), Some(&Cell::Number(2.0)));
    }
}
