//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every engine call is async, so handlers just `.await` them.
//!
//! All `/api` routes sit behind the gateway authentication middleware; the `route!` macro adds the role check.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use fee_payment_engine::{
    db_types::{OrderId, Role, SubmissionId},
    extractor::ExtractionOutcome,
    BillingApi,
    ContractApi,
    DecisionApi,
    FeeLedgerDatabase,
    OrderApi,
    VerificationApi,
};
use log::*;

use crate::{
    data_objects::{
        BillingRunRequest,
        EvidenceRequest,
        NewOrderRequest,
        RegisterContractRequest,
        ResolutionResult,
        ResolveRequest,
        VerificationResult,
    },
    errors::ServerError,
    helpers::caller,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl FeeLedgerDatabase where requires [Role::User]);
pub async fn create_order<B: FeeLedgerDatabase>(
    req: HttpRequest,
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let caller = caller(&req)?;
    let NewOrderRequest { bid_id, idempotency_key } = body.into_inner();
    debug!("💻️ POST order for bid {bid_id} from {}", caller.user_id);
    let order = api.create_order(&bid_id, &caller.user_id, &idempotency_key).await?;
    let response = if order.reused { HttpResponse::Ok().json(order) } else { HttpResponse::Created().json(order) };
    Ok(response)
}

route!(my_pending_orders => Get "/orders/pending" impl FeeLedgerDatabase where requires [Role::User]);
pub async fn my_pending_orders<B: FeeLedgerDatabase>(
    req: HttpRequest,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let caller = caller(&req)?;
    debug!("💻️ GET pending orders for {}", caller.user_id);
    let orders = api.list_pending_orders(&caller.user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl FeeLedgerDatabase where requires [Role::User]);
pub async fn order_by_id<B: FeeLedgerDatabase>(
    req: HttpRequest,
    path: web::Path<OrderId>,
    api: web::Data<OrderApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let caller = caller(&req)?;
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for {}", caller.user_id);
    let order = api.get_order(&order_id, &caller.user_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

// ----------------------------------------------   Evidence  --------------------------------------------------
route!(submit_evidence => Post "/orders/{order_id}/submissions" impl FeeLedgerDatabase where requires [Role::User]);
pub async fn submit_evidence<B: FeeLedgerDatabase>(
    req: HttpRequest,
    path: web::Path<OrderId>,
    body: web::Json<EvidenceRequest>,
    api: web::Data<VerificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let caller = caller(&req)?;
    let order_id = path.into_inner();
    debug!("💻️ POST evidence for order {order_id} from {}", caller.user_id);
    let submission = api.submit_evidence(&order_id, &caller.user_id, &body.evidence_ref).await?;
    Ok(HttpResponse::Created().json(submission))
}

route!(extraction_result => Post "/submissions/{submission_id}/extraction" impl FeeLedgerDatabase where requires [Role::Extractor]);
pub async fn extraction_result<B: FeeLedgerDatabase>(
    path: web::Path<SubmissionId>,
    body: web::Json<ExtractionOutcome>,
    api: web::Data<VerificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let submission_id = path.into_inner();
    debug!("💻️ POST extraction result for submission {submission_id}");
    let outcome = api.process_extraction(&submission_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(VerificationResult::from(outcome)))
}

// ----------------------------------------------   Review  ----------------------------------------------------
route!(review_queue => Get "/admin/review_queue" impl FeeLedgerDatabase where requires [Role::Admin]);
pub async fn review_queue<B: FeeLedgerDatabase>(
    req: HttpRequest,
    api: web::Data<DecisionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let admin = caller(&req)?;
    debug!("💻️ GET review queue for {}", admin.user_id);
    let queue = api.review_queue(&admin).await?;
    Ok(HttpResponse::Ok().json(queue))
}

route!(resolve_submission => Post "/admin/submissions/{submission_id}/resolve" impl FeeLedgerDatabase where requires [Role::Admin]);
pub async fn resolve_submission<B: FeeLedgerDatabase>(
    req: HttpRequest,
    path: web::Path<SubmissionId>,
    body: web::Json<ResolveRequest>,
    api: web::Data<DecisionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let admin = caller(&req)?;
    let submission_id = path.into_inner();
    let ResolveRequest { decision, notes, reason } = body.into_inner();
    info!("💻️ {} resolves submission {submission_id}: {decision:?}", admin.user_id);
    let outcome = api.resolve(&submission_id, decision, &admin, notes, reason).await?;
    Ok(HttpResponse::Ok().json(ResolutionResult::from(outcome)))
}

// ----------------------------------------------   Contracts  -------------------------------------------------
route!(register_contract => Post "/contracts" impl FeeLedgerDatabase where requires [Role::Service]);
pub async fn register_contract<B: FeeLedgerDatabase>(
    body: web::Json<RegisterContractRequest>,
    api: web::Data<ContractApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let RegisterContractRequest { terms, billing_started_at } = body.into_inner();
    debug!("💻️ POST contract for bid {}", terms.bid_id);
    let registration = api.register_contract(terms, billing_started_at.unwrap_or_else(Utc::now)).await?;
    let response = if registration.reused {
        HttpResponse::Ok().json(registration)
    } else {
        HttpResponse::Created().json(registration)
    };
    Ok(response)
}

// ----------------------------------------------   Billing  ---------------------------------------------------
route!(run_billing => Post "/admin/billing/run" impl FeeLedgerDatabase where requires [Role::Admin]);
pub async fn run_billing<B: FeeLedgerDatabase>(
    req: HttpRequest,
    body: Option<web::Json<BillingRunRequest>>,
    api: web::Data<BillingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let admin = caller(&req)?;
    let now = body.and_then(|b| b.into_inner().now).unwrap_or_else(Utc::now);
    info!("💻️ {} started a billing run as of {now}", admin.user_id);
    let report = api.run_billing_cycle(now).await?;
    Ok(HttpResponse::Ok().json(report))
}
