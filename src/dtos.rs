use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CookieStand, CookieStandFields, CookieStandId, UserId};

pub trait Response {}

/// Body of create and replace requests; every field is required.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieStandRequest {
    pub location: String,
    pub owner: UserId,
    pub description: String,
    pub hourly_sales: Vec<String>,
    pub minimum_customers_per_hour: i32,
    pub maximum_customers_per_hour: i32,
    pub average_cookies_per_sale: f64,
}

impl From<CookieStandRequest> for CookieStandFields {
    fn from(request: CookieStandRequest) -> Self {
        CookieStandFields {
            location: request.location,
            owner: request.owner,
            description: request.description,
            hourly_sales: request.hourly_sales,
            minimum_customers_per_hour: request.minimum_customers_per_hour,
            maximum_customers_per_hour: request.maximum_customers_per_hour,
            average_cookies_per_sale: request.average_cookies_per_sale,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CookieStandPatchRequest {
    pub location: Option<String>,
    pub owner: Option<UserId>,
    pub description: Option<String>,
    pub hourly_sales: Option<Vec<String>>,
    pub minimum_customers_per_hour: Option<i32>,
    pub maximum_customers_per_hour: Option<i32>,
    pub average_cookies_per_sale: Option<f64>,
}

impl CookieStandPatchRequest {
    pub fn apply(self, fields: &mut CookieStandFields) {
        if let Some(location) = self.location {
            fields.location = location;
        }
        if let Some(owner) = self.owner {
            fields.owner = owner;
        }
        if let Some(description) = self.description {
            fields.description = description;
        }
        if let Some(hourly_sales) = self.hourly_sales {
            fields.hourly_sales = hourly_sales;
        }
        if let Some(minimum) = self.minimum_customers_per_hour {
            fields.minimum_customers_per_hour = minimum;
        }
        if let Some(maximum) = self.maximum_customers_per_hour {
            fields.maximum_customers_per_hour = maximum;
        }
        if let Some(average) = self.average_cookies_per_sale {
            fields.average_cookies_per_sale = average;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CookieStandResponse {
    pub id: CookieStandId,
    pub location: String,
    pub owner: UserId,
    pub description: String,
    pub hourly_sales: Vec<String>,
    pub minimum_customers_per_hour: i32,
    pub maximum_customers_per_hour: i32,
    pub average_cookies_per_sale: f64,
}
impl Response for CookieStandResponse {}

impl From<CookieStand> for CookieStandResponse {
    fn from(stand: CookieStand) -> Self {
        CookieStandResponse {
            id: stand.id,
            location: stand.location,
            owner: stand.owner,
            description: stand.description,
            hourly_sales: stand.hourly_sales,
            minimum_customers_per_hour: stand.minimum_customers_per_hour,
            maximum_customers_per_hour: stand.maximum_customers_per_hour,
            average_cookies_per_sale: stand.average_cookies_per_sale,
        }
    }
}

// the list endpoint returns a bare JSON array
pub type CookieStandListResponse = Vec<CookieStandResponse>;
impl Response for CookieStandListResponse {}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
impl Response for LoginResponse {}

#[derive(Debug, Deserialize, Serialize)]
pub struct ApiError {
    pub error: String,
}
impl Response for ApiError {}

#[derive(Deserialize, Serialize)]
pub struct EmptyResponse {}
impl Response for EmptyResponse {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_leaves_unset_fields_alone() {
        let mut fields = CookieStandFields {
            location: String::from("Seattle"),
            owner: 1,
            description: String::from("Tasty Cookies"),
            hourly_sales: vec![String::from("Money")],
            minimum_customers_per_hour: 1,
            maximum_customers_per_hour: 2,
            average_cookies_per_sale: 4.0,
        };

        CookieStandPatchRequest {
            description: Some(String::from("homey")),
            maximum_customers_per_hour: Some(9),
            ..Default::default()
        }
        .apply(&mut fields);

        assert_eq!(fields.location, "Seattle");
        assert_eq!(fields.description, "homey");
        assert_eq!(fields.minimum_customers_per_hour, 1);
        assert_eq!(fields.maximum_customers_per_hour, 9);
    }

    #[test]
    fn request_requires_every_numeric_field() {
        let missing_average = serde_json::json!({
            "location": "Portland",
            "owner": 1,
            "description": "homey",
            "hourly_sales": ["Moneyness"],
            "minimum_customers_per_hour": 2,
            "maximum_customers_per_hour": 4
        });

        assert!(serde_json::from_value::<CookieStandRequest>(missing_average).is_err());
    }
}
