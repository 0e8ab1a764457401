use crate::server::ServerRouter;

mod accounts;
mod feed;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(accounts::routes())
        .merge(feed::routes())
        .merge(posts::routes())
        .merge(users::routes())
}
