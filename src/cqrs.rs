use std::sync::Arc;

use crate::{
    domain::CookieStandId,
    dtos::{
        CookieStandListResponse, CookieStandPatchRequest, CookieStandRequest, CookieStandResponse,
        EmptyResponse, Response,
    },
    error::AppError,
    uow::RepositoryContext,
};

// traits
pub trait Command {}
pub trait Query {}

#[allow(async_fn_in_trait)]
pub trait CommandHandler<C: Command, R: Response> {
    async fn handle(&self, input: C) -> Result<R, AppError>;
}

#[allow(async_fn_in_trait)]
pub trait QueryHandler<Q: Query, R: Response> {
    async fn handle(&self, input: &Q) -> Result<R, AppError>;
}

// commands
pub struct CreateCookieStandCommand {
    pub stand: CookieStandRequest,
}
impl Command for CreateCookieStandCommand {}

pub struct ReplaceCookieStandCommand {
    pub id: CookieStandId,
    pub stand: CookieStandRequest,
}
impl Command for ReplaceCookieStandCommand {}

pub struct UpdateCookieStandCommand {
    pub id: CookieStandId,
    pub patch: CookieStandPatchRequest,
}
impl Command for UpdateCookieStandCommand {}

pub struct DeleteCookieStandCommand {
    pub id: CookieStandId,
}
impl Command for DeleteCookieStandCommand {}

// queries
pub struct GetCookieStandQuery {
    pub id: CookieStandId,
}
impl Query for GetCookieStandQuery {}

pub struct GetCookieStandsQuery;
impl Query for GetCookieStandsQuery {}

// command handlers
#[derive(Clone)]
pub struct CreateCookieStandCommandHandler {
    uow: Arc<RepositoryContext>,
}

impl CreateCookieStandCommandHandler {
    pub fn new(uow: Arc<RepositoryContext>) -> Self {
        CreateCookieStandCommandHandler { uow }
    }
}

impl CommandHandler<CreateCookieStandCommand, CookieStandResponse>
    for CreateCookieStandCommandHandler
{
    async fn handle(&self, input: CreateCookieStandCommand) -> Result<CookieStandResponse, AppError> {
        let created = self.uow.add_cookie_stand(input.stand.into()).await?;
        Ok(created.into())
    }
}

#[derive(Clone)]
pub struct ReplaceCookieStandCommandHandler {
    uow: Arc<RepositoryContext>,
}

impl ReplaceCookieStandCommandHandler {
    pub fn new(uow: Arc<RepositoryContext>) -> Self {
        ReplaceCookieStandCommandHandler { uow }
    }
}

impl CommandHandler<ReplaceCookieStandCommand, CookieStandResponse>
    for ReplaceCookieStandCommandHandler
{
    async fn handle(&self, input: ReplaceCookieStandCommand) -> Result<CookieStandResponse, AppError> {
        let updated = self
            .uow
            .replace_cookie_stand(input.id, input.stand.into())
            .await?;
        Ok(updated.into())
    }
}

#[derive(Clone)]
pub struct UpdateCookieStandCommandHandler {
    uow: Arc<RepositoryContext>,
}

impl UpdateCookieStandCommandHandler {
    pub fn new(uow: Arc<RepositoryContext>) -> Self {
        UpdateCookieStandCommandHandler { uow }
    }
}

impl CommandHandler<UpdateCookieStandCommand, CookieStandResponse>
    for UpdateCookieStandCommandHandler
{
    async fn handle(&self, input: UpdateCookieStandCommand) -> Result<CookieStandResponse, AppError> {
        let existing = self.uow.cookie_stand_repository.read(input.id).await?;

        let mut fields = existing.fields();
        input.patch.apply(&mut fields);

        let updated = self.uow.replace_cookie_stand(input.id, fields).await?;
        Ok(updated.into())
    }
}

#[derive(Clone)]
pub struct DeleteCookieStandCommandHandler {
    uow: Arc<RepositoryContext>,
}

impl DeleteCookieStandCommandHandler {
    pub fn new(uow: Arc<RepositoryContext>) -> Self {
        DeleteCookieStandCommandHandler { uow }
    }
}

impl CommandHandler<DeleteCookieStandCommand, EmptyResponse> for DeleteCookieStandCommandHandler {
    async fn handle(&self, input: DeleteCookieStandCommand) -> Result<EmptyResponse, AppError> {
        self.uow.remove_cookie_stand(input.id).await?;
        Ok(EmptyResponse {})
    }
}

// query handlers
#[derive(Clone)]
pub struct GetCookieStandsQueryHandler {
    uow: Arc<RepositoryContext>,
}

impl GetCookieStandsQueryHandler {
    pub fn new(uow: Arc<RepositoryContext>) -> Self {
        GetCookieStandsQueryHandler { uow }
    }
}

impl QueryHandler<GetCookieStandQuery, CookieStandResponse> for GetCookieStandsQueryHandler {
    async fn handle(&self, input: &GetCookieStandQuery) -> Result<CookieStandResponse, AppError> {
        let stand = self.uow.cookie_stand_repository.read(input.id).await?;
        Ok(stand.into())
    }
}

impl QueryHandler<GetCookieStandsQuery, CookieStandListResponse> for GetCookieStandsQueryHandler {
    async fn handle(&self, _: &GetCookieStandsQuery) -> Result<CookieStandListResponse, AppError> {
        let stands = self.uow.cookie_stand_repository.read_all().await?;
        Ok(stands.into_iter().map(CookieStandResponse::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{CookieStand, CookieStandFields, User},
        repositories::{MockCookieStandRepository, MockUserRepository, RepositoryError},
    };

    fn request() -> CookieStandRequest {
        CookieStandRequest {
            location: String::from("Portland"),
            owner: 1,
            description: String::from("homey"),
            hourly_sales: vec![String::from("Moneyness")],
            minimum_customers_per_hour: 2,
            maximum_customers_per_hour: 4,
            average_cookies_per_sale: 4.0,
        }
    }

    fn owner_exists() -> MockUserRepository {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| {
            Ok(Some(User {
                id,
                username: String::from("testuser1"),
                password_hash: String::new(),
            }))
        });
        users
    }

    fn context(stands: MockCookieStandRepository, users: MockUserRepository) -> Arc<RepositoryContext> {
        Arc::new(RepositoryContext::new(Arc::new(stands), Arc::new(users)))
    }

    #[tokio::test]
    async fn create_returns_the_stored_representation() {
        let mut stands = MockCookieStandRepository::new();
        stands
            .expect_create()
            .times(1)
            .returning(|fields| Ok(CookieStand::from_fields(2, fields)));

        let handler = CreateCookieStandCommandHandler::new(context(stands, owner_exists()));
        let response = handler
            .handle(CreateCookieStandCommand { stand: request() })
            .await
            .unwrap();

        assert_eq!(response.id, 2);
        assert_eq!(response.location, "Portland");
        assert_eq!(response.hourly_sales, vec!["Moneyness"]);
    }

    #[tokio::test]
    async fn storage_failures_propagate() {
        let mut stands = MockCookieStandRepository::new();
        stands
            .expect_read_all()
            .returning(|| Err(RepositoryError::Storage(String::from("connection reset"))));

        let handler = GetCookieStandsQueryHandler::new(context(stands, MockUserRepository::new()));
        let result: Result<CookieStandListResponse, AppError> =
            handler.handle(&GetCookieStandsQuery).await;

        assert!(matches!(
            result,
            Err(AppError::Repository(RepositoryError::Storage(_)))
        ));
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_storage() {
        let mut stands = MockCookieStandRepository::new();
        stands.expect_create().never();

        let mut stand = request();
        stand.location = String::new();
        let handler = CreateCookieStandCommandHandler::new(context(stands, owner_exists()));

        assert!(matches!(
            handler.handle(CreateCookieStandCommand { stand }).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn patch_merges_into_the_existing_stand() {
        let existing = CookieStand::from_fields(
            1,
            CookieStandFields {
                location: String::from("Seattle"),
                owner: 1,
                description: String::from("Tasty Cookies"),
                hourly_sales: vec![String::from("Money")],
                minimum_customers_per_hour: 1,
                maximum_customers_per_hour: 2,
                average_cookies_per_sale: 4.0,
            },
        );
        let mut stands = MockCookieStandRepository::new();
        let stored = existing.clone();
        stands.expect_read().returning(move |_| Ok(stored.clone()));
        stands
            .expect_update()
            .times(1)
            .returning(|id, fields| Ok(CookieStand::from_fields(id, fields)));

        let handler = UpdateCookieStandCommandHandler::new(context(stands, owner_exists()));
        let response = handler
            .handle(UpdateCookieStandCommand {
                id: 1,
                patch: CookieStandPatchRequest {
                    description: Some(String::from("my cookie is made of dirt. ")),
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        assert_eq!(response.location, "Seattle");
        assert_eq!(response.description, "my cookie is made of dirt. ");
        assert_eq!(response.maximum_customers_per_hour, 2);
    }
}
