use std::sync::Arc;

use crate::{
    auth::AuthService,
    cqrs::{
        CreateCookieStandCommandHandler, DeleteCookieStandCommandHandler,
        GetCookieStandsQueryHandler, ReplaceCookieStandCommandHandler,
        UpdateCookieStandCommandHandler,
    },
    uow::RepositoryContext,
};

#[derive(Clone)]
pub struct AppState {
    pub create_cookie_stand_command_handler: Arc<CreateCookieStandCommandHandler>,
    pub replace_cookie_stand_command_handler: Arc<ReplaceCookieStandCommandHandler>,
    pub update_cookie_stand_command_handler: Arc<UpdateCookieStandCommandHandler>,
    pub delete_cookie_stand_command_handler: Arc<DeleteCookieStandCommandHandler>,
    pub get_cookie_stands_query_handler: Arc<GetCookieStandsQueryHandler>,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    pub fn new(uow: Arc<RepositoryContext>, auth_service: Arc<AuthService>) -> Self {
        AppState {
            create_cookie_stand_command_handler: Arc::new(CreateCookieStandCommandHandler::new(
                uow.clone(),
            )),
            replace_cookie_stand_command_handler: Arc::new(ReplaceCookieStandCommandHandler::new(
                uow.clone(),
            )),
            update_cookie_stand_command_handler: Arc::new(UpdateCookieStandCommandHandler::new(
                uow.clone(),
            )),
            delete_cookie_stand_command_handler: Arc::new(DeleteCookieStandCommandHandler::new(
                uow.clone(),
            )),
            get_cookie_stands_query_handler: Arc::new(GetCookieStandsQueryHandler::new(uow)),
            auth_service,
        }
    }
}
