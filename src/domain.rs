pub const MAX_LOCATION_LENGTH: usize = 256;

pub type CookieStandId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct CookieStand {
    pub id: CookieStandId,
    pub location: String,
    pub owner: UserId,
    pub description: String,
    pub hourly_sales: Vec<String>,
    pub minimum_customers_per_hour: i32,
    pub maximum_customers_per_hour: i32,
    pub average_cookies_per_sale: f64,
}

/// Every field of a stand except its identifier, as accepted on create and replace.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieStandFields {
    pub location: String,
    pub owner: UserId,
    pub description: String,
    pub hourly_sales: Vec<String>,
    pub minimum_customers_per_hour: i32,
    pub maximum_customers_per_hour: i32,
    pub average_cookies_per_sale: f64,
}

impl CookieStand {
    pub fn from_fields(id: CookieStandId, fields: CookieStandFields) -> Self {
        CookieStand {
            id,
            location: fields.location,
            owner: fields.owner,
            description: fields.description,
            hourly_sales: fields.hourly_sales,
            minimum_customers_per_hour: fields.minimum_customers_per_hour,
            maximum_customers_per_hour: fields.maximum_customers_per_hour,
            average_cookies_per_sale: fields.average_cookies_per_sale,
        }
    }

    pub fn fields(&self) -> CookieStandFields {
        CookieStandFields {
            location: self.location.clone(),
            owner: self.owner,
            description: self.description.clone(),
            hourly_sales: self.hourly_sales.clone(),
            minimum_customers_per_hour: self.minimum_customers_per_hour,
            maximum_customers_per_hour: self.maximum_customers_per_hour,
            average_cookies_per_sale: self.average_cookies_per_sale,
        }
    }
}

impl CookieStandFields {
    /// Field-level checks only; the customer range is not cross-checked.
    pub fn validate(&self) -> Result<(), String> {
        let location = self.location.trim();
        if location.is_empty() {
            return Err(String::from("location must not be blank"));
        }
        if location.chars().count() > MAX_LOCATION_LENGTH {
            return Err(format!(
                "location must be at most {} characters",
                MAX_LOCATION_LENGTH
            ));
        }
        if !self.average_cookies_per_sale.is_finite() {
            return Err(String::from("average_cookies_per_sale must be a finite number"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> CookieStandFields {
        CookieStandFields {
            location: String::from("Seattle"),
            owner: 1,
            description: String::new(),
            hourly_sales: vec![String::from("Money")],
            minimum_customers_per_hour: 5,
            maximum_customers_per_hour: 2,
            average_cookies_per_sale: 4.0,
        }
    }

    #[test]
    fn accepts_inverted_customer_range() {
        assert!(fields().validate().is_ok());
    }

    #[test]
    fn rejects_blank_or_overlong_location() {
        let mut blank = fields();
        blank.location = String::from("   ");
        assert!(blank.validate().is_err());

        let mut long = fields();
        long.location = "x".repeat(MAX_LOCATION_LENGTH + 1);
        assert!(long.validate().is_err());
    }

    #[test]
    fn round_trips_through_fields() {
        let stand = CookieStand::from_fields(4, fields());
        assert_eq!(stand.id, 4);
        assert_eq!(stand.fields(), fields());
    }
}
