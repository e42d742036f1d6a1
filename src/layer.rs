use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use http::{Request, Response};
use tower_cookies::{CookieManager, Cookies};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    MemoryStore,
    config::SessionConfig,
    controller::{CookieController, PlaintextCookie},
    resolver::SessionResolver,
    store::SessionStore,
};

#[derive(Debug, Clone)]
pub struct SessionManagerLayer<C: CookieController = PlaintextCookie> {
    resolver: SessionResolver,
    controller: C,
}

impl SessionManagerLayer<PlaintextCookie> {
    #[must_use]
    pub fn new<S: SessionStore>(store: S) -> Self {
        Self {
            resolver: SessionResolver::new(SessionConfig::default(), store),
            controller: PlaintextCookie,
        }
    }
}

impl<C: CookieController> SessionManagerLayer<C> {
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.resolver = self.resolver.with_config(config);
        self
    }

    #[must_use]
    pub fn with_id_generator<F>(mut self, gen_id: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.resolver = self.resolver.with_id_generator(gen_id);
        self
    }

    #[must_use]
    pub fn with_controller<C2: CookieController>(self, controller: C2) -> SessionManagerLayer<C2> {
        SessionManagerLayer {
            resolver: self.resolver,
            controller,
        }
    }

    #[cfg(feature = "signed")]
    #[must_use]
    pub fn with_signed(self, key: crate::Key) -> SessionManagerLayer<crate::SignedCookie> {
        self.with_controller(crate::SignedCookie::new(key))
    }

    #[cfg(feature = "private")]
    #[must_use]
    pub fn with_private(self, key: crate::Key) -> SessionManagerLayer<crate::PrivateCookie> {
        self.with_controller(crate::PrivateCookie::new(key))
    }

    pub fn resolver(&self) -> &SessionResolver {
        &self.resolver
    }
}

impl Default for SessionManagerLayer<PlaintextCookie> {
    fn default() -> Self {
        Self::new(MemoryStore::new())
    }
}

#[derive(Debug, Clone)]
pub struct SessionManager<S, C: CookieController> {
    inner: S,
    resolver: SessionResolver,
    controller: C,
}

impl<S, C: CookieController> Layer<S> for SessionManagerLayer<C> {
    type Service = CookieManager<SessionManager<S, C>>;

    fn layer(&self, inner: S) -> Self::Service {
        CookieManager::new(SessionManager {
            inner,
            resolver: self.resolver.clone(),
            controller: self.controller.clone(),
        })
    }
}

impl<ReqBody, ResBody, S, C> Service<Request<ReqBody>> for SessionManager<S, C>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
    C: CookieController,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let resolver = self.resolver.clone();
        let controller = self.controller.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let cookies = match req.extensions().get::<Cookies>().cloned() {
                Some(cookies) => cookies,
                None => {
                    let mut res = Response::default();
                    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                    return Ok(res);
                }
            };

            let candidate = controller.get(&cookies, resolver.config().name());
            let session = resolver.request(candidate);
            req.extensions_mut().insert(session.clone());

            let res = inner.call(req).await?;

            let failed = res.status().is_server_error();
            if resolver.config().auto_commit
                && !failed
                && let Err(err) = session.persist().await
            {
                tracing::error!(err = %err, "session commit failed");
                let mut res = Response::default();
                *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                return Ok(res);
            }

            // Auto-commit is skipped for failed responses; new sessions get a cookie only once stored.
            let cookie = if failed {
                session.finalize_saved()
            } else {
                session.finalize()
            };
            if let Some(cookie) = cookie {
                controller.sign(&cookies, cookie);
            }

            Ok(res)
        })
    }
}
