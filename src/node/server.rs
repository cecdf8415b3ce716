use std::{any::Any, collections::BTreeSet, collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::{
    network::Address,
    primitive::{
        Counter, CounterMap, IndexedMap, LeaderElection, Lock, Map as MapPrimitive, MultiMap,
        Primitive, PrimitiveError, PrimitiveKind, Set, Value as ValuePrimitive,
    },
    protocol::{ErrorBody, ErrorResponse, HEALTH_PATH, HealthResponse, PartitionId},
};

/// Named primitive instances hosted by one node. An instance is kept only while it differs
/// from a fresh one, so reads of unknown names leave nothing behind.
#[derive(Default)]
pub struct PrimitiveRegistry {
    instances: HashMap<(PrimitiveKind, String), Box<dyn Any + Send>>,
}

impl PrimitiveRegistry {
    pub fn apply<P: Primitive>(
        &mut self,
        name: &str,
        request: P::Request,
    ) -> Result<P::Response, PrimitiveError> {
        let key = (P::KIND, name.to_string());
        let Some(instance) = self.instances.get_mut(&key) else {
            let mut fresh = P::default();
            let result = fresh.apply(request);
            if !fresh.is_pristine() {
                self.instances.insert(key, Box::new(fresh));
            }
            return result;
        };

        let primitive = instance.downcast_mut::<P>().ok_or_else(|| {
            PrimitiveError::invalid_argument(format!("{name:?} is not a {}", P::KIND))
        })?;
        let result = primitive.apply(request);
        if primitive.is_pristine() {
            self.instances.remove(&key);
        }
        result
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[derive(Clone)]
pub struct NodeState {
    pub address: Address,
    pub partitions: Arc<BTreeSet<PartitionId>>,
    pub started_at: DateTime<Utc>,
    pub registry: Arc<Mutex<PrimitiveRegistry>>,
}

impl NodeState {
    pub fn new(address: Address, partitions: impl IntoIterator<Item = PartitionId>) -> Self {
        Self {
            address,
            partitions: Arc::new(partitions.into_iter().collect()),
            started_at: Utc::now(),
            registry: Arc::new(Mutex::new(PrimitiveRegistry::default())),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
    details: Map<String, Value>,
}

impl ApiError {
    fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status,
            details: Map::new(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request", StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", StatusCode::NOT_FOUND, message)
    }

    fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code.to_string(),
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S>,
    <axum::Json<T> as FromRequest<S>>::Rejection: std::fmt::Display,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::invalid_request(e.to_string()))?;
        Ok(Self(value))
    }
}

pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S>,
    <Path<T> as FromRequestParts<S>>::Rejection: std::fmt::Display,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::invalid_request(e.to_string()))?;
        Ok(Self(value))
    }
}

pub fn build_router(state: NodeState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(&route::<Counter>(), post(execute::<Counter>))
        .route(&route::<CounterMap>(), post(execute::<CounterMap>))
        .route(&route::<LeaderElection>(), post(execute::<LeaderElection>))
        .route(&route::<IndexedMap>(), post(execute::<IndexedMap>))
        .route(&route::<Lock>(), post(execute::<Lock>))
        .route(&route::<MapPrimitive>(), post(execute::<MapPrimitive>))
        .route(&route::<MultiMap>(), post(execute::<MultiMap>))
        .route(&route::<Set>(), post(execute::<Set>))
        .route(&route::<ValuePrimitive>(), post(execute::<ValuePrimitive>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn route<P: Primitive>() -> String {
    format!("/v1/partitions/:partition_id/{}/:name", P::KIND.as_str())
}

async fn health(State(state): State<NodeState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        address: state.address.to_string(),
        partitions: state.partitions.iter().copied().collect(),
        started_at: state
            .started_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

async fn execute<P: Primitive>(
    State(state): State<NodeState>,
    ApiPath((partition_id, name)): ApiPath<(PartitionId, String)>,
    ApiJson(request): ApiJson<P::Request>,
) -> Result<Json<Result<P::Response, PrimitiveError>>, ApiError> {
    if !state.partitions.contains(&partition_id) {
        return Err(ApiError::not_found(format!(
            "partition {partition_id} is not hosted by {}",
            state.address
        ))
        .with_detail("partition_id", partition_id));
    }
    debug!(kind = %P::KIND, primitive = %name, ?request, "apply");
    let mut registry = state.registry.lock().await;
    Ok(Json(registry.apply::<P>(&name, request)))
}
