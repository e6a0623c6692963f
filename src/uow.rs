use std::sync::Arc;

use tracing::{event, Level};

use crate::{
    domain::{CookieStand, CookieStandFields, CookieStandId, UserId},
    error::AppError,
    repositories::{CookieStandRepository, UserRepository},
};

/// Groups the repositories a request touches and enforces the owner reference on writes.
#[derive(Clone)]
pub struct RepositoryContext {
    pub cookie_stand_repository: Arc<dyn CookieStandRepository>,
    pub user_repository: Arc<dyn UserRepository>,
}

impl RepositoryContext {
    pub fn new(
        cookie_stand_repository: Arc<dyn CookieStandRepository>,
        user_repository: Arc<dyn UserRepository>,
    ) -> RepositoryContext {
        RepositoryContext {
            cookie_stand_repository,
            user_repository,
        }
    }

    pub async fn add_cookie_stand(&self, fields: CookieStandFields) -> Result<CookieStand, AppError> {
        self.check_fields(&fields).await?;

        let created = self.cookie_stand_repository.create(fields).await?;
        event!(Level::INFO, "Created cookie stand {} at {}", created.id, created.location);
        Ok(created)
    }

    pub async fn replace_cookie_stand(
        &self,
        id: CookieStandId,
        fields: CookieStandFields,
    ) -> Result<CookieStand, AppError> {
        // a missing stand wins over a bad payload
        self.cookie_stand_repository.read(id).await?;
        self.check_fields(&fields).await?;

        let updated = self.cookie_stand_repository.update(id, fields).await?;
        event!(Level::INFO, "Updated cookie stand {}", updated.id);
        Ok(updated)
    }

    pub async fn remove_cookie_stand(&self, id: CookieStandId) -> Result<(), AppError> {
        self.cookie_stand_repository.delete(id).await?;
        event!(Level::INFO, "Deleted cookie stand {}", id);
        Ok(())
    }

    async fn check_fields(&self, fields: &CookieStandFields) -> Result<(), AppError> {
        fields.validate().map_err(AppError::BadRequest)?;
        self.ensure_owner_exists(fields.owner).await
    }

    async fn ensure_owner_exists(&self, owner: UserId) -> Result<(), AppError> {
        match self.user_repository.find_by_id(owner).await? {
            Some(_) => Ok(()),
            None => {
                event!(Level::WARN, "Rejected write referencing unknown owner {}", owner);
                Err(AppError::BadRequest(format!("owner {} does not exist", owner)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryCookieStandRepository, InMemoryUserRepository};

    async fn context_with_owner() -> RepositoryContext {
        let users = Arc::new(InMemoryUserRepository::new());
        users.create("testuser1", "hash").await.unwrap();
        RepositoryContext::new(Arc::new(InMemoryCookieStandRepository::new()), users)
    }

    fn fields(owner: UserId) -> CookieStandFields {
        CookieStandFields {
            location: String::from("Portland"),
            owner,
            description: String::from("homey"),
            hourly_sales: vec![String::from("Moneyness")],
            minimum_customers_per_hour: 2,
            maximum_customers_per_hour: 4,
            average_cookies_per_sale: 4.0,
        }
    }

    #[tokio::test]
    async fn writes_require_an_existing_owner() {
        let context = context_with_owner().await;

        assert!(context.add_cookie_stand(fields(1)).await.is_ok());
        assert!(matches!(
            context.add_cookie_stand(fields(42)).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            context.replace_cookie_stand(1, fields(42)).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn replacing_a_missing_stand_is_not_found() {
        let context = context_with_owner().await;

        assert!(matches!(
            context.replace_cookie_stand(5, fields(42)).await,
            Err(AppError::Repository(crate::repositories::RepositoryError::NotFound { .. }))
        ));
    }
}
