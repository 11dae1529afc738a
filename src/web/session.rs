// src/web/session.rs
use rocket::http::{Cookie, SameSite};
use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use std::convert::Infallible;
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "jb_session";

/// Opaque visitor identity carried in a private cookie. Everything else about
/// the visitor lives server-side, keyed by this id.
#[derive(Debug, Clone)]
pub struct VisitorSession(String);

impl VisitorSession {
    pub fn id(&self) -> &str {
        &self.0
    }
}

// Request-local cache so every guard in one request sees the same id
struct CachedVisitorId(String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VisitorSession {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let cached = req.local_cache(|| {
            let jar = req.cookies();
            let existing = jar
                .get_private(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_string())
                .filter(|id| Uuid::parse_str(id).is_ok());

            match existing {
                Some(id) => CachedVisitorId(id),
                None => {
                    let id = Uuid::new_v4().to_string();
                    debug!("Issuing new visitor session");
                    jar.add_private(
                        Cookie::build((SESSION_COOKIE, id.clone()))
                            .path("/")
                            .http_only(true)
                            .same_site(SameSite::Lax),
                    );
                    CachedVisitorId(id)
                }
            }
        });

        Outcome::Success(VisitorSession(cached.0.clone()))
    }
}
