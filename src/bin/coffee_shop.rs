//! Coffee shop API: a public drink menu, with barista and manager routes behind permission checks.
//!
//! Drinks live in memory. Authorization is configured through `AUTH_DOMAIN`, `API_AUDIENCE` and the other
//! variables read by [`AuthConfig::from_env`].
use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use jwks_guard::{AuthConfig, Authorizer, Claims};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ingredient {
    name: String,
    color: String,
    parts: u32,
}

#[derive(Debug, Clone)]
struct Drink {
    id: u64,
    title: String,
    recipe: Vec<Ingredient>,
}

impl Drink {
    /// Menu representation: colors and proportions only.
    fn short(&self) -> Value {
        let recipe: Vec<_> = self
            .recipe
            .iter()
            .map(|ingredient| json!({"color": ingredient.color, "parts": ingredient.parts}))
            .collect();
        json!({"id": self.id, "title": self.title, "recipe": recipe})
    }

    fn long(&self) -> Value {
        json!({"id": self.id, "title": self.title, "recipe": self.recipe})
    }
}

#[derive(Default)]
struct Menu {
    last_id: u64,
    drinks: BTreeMap<u64, Drink>,
}

impl Menu {
    fn create(&mut self, request: DrinkRequest) -> Result<&Drink, ApiError> {
        let (Some(title), Some(recipe)) = (request.title, request.recipe) else {
            return Err(ApiError::Unprocessable);
        };
        self.check(None, Some(&title), Some(&recipe))?;

        self.last_id += 1;
        let id = self.last_id;
        Ok(self.drinks.entry(id).or_insert(Drink { id, title, recipe }))
    }

    fn update(&mut self, id: u64, request: DrinkRequest) -> Result<&Drink, ApiError> {
        if request.title.is_none() && request.recipe.is_none() {
            return Err(ApiError::Unprocessable);
        }
        if !self.drinks.contains_key(&id) {
            return Err(ApiError::NotFound);
        }
        self.check(Some(id), request.title.as_deref(), request.recipe.as_deref())?;

        let drink = self.drinks.get_mut(&id).ok_or(ApiError::NotFound)?;
        if let Some(title) = request.title {
            drink.title = title;
        }
        if let Some(recipe) = request.recipe {
            drink.recipe = recipe;
        }
        Ok(drink)
    }

    fn remove(&mut self, id: u64) -> Result<Drink, ApiError> {
        self.drinks.remove(&id).ok_or(ApiError::NotFound)
    }

    /// Titles must be non-blank and unique across the menu, recipes non-empty. `id` is the drink being edited.
    fn check(&self, id: Option<u64>, title: Option<&str>, recipe: Option<&[Ingredient]>) -> Result<(), ApiError> {
        if let Some(title) = title {
            let taken = self
                .drinks
                .values()
                .any(|drink| drink.title == title && Some(drink.id) != id);
            if title.trim().is_empty() || taken {
                return Err(ApiError::Unprocessable);
            }
        }
        if recipe.is_some_and(<[Ingredient]>::is_empty) {
            return Err(ApiError::Unprocessable);
        }
        Ok(())
    }
}

type AppState = Arc<RwLock<Menu>>;

#[derive(Debug, Deserialize)]
struct DrinkRequest {
    title: Option<String>,
    recipe: Option<Vec<Ingredient>>,
}

#[derive(Debug)]
enum ApiError {
    NotFound,
    Unprocessable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "resource not found"),
            ApiError::Unprocessable => (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable"),
        };
        let body = Json(json!({
            "success": false,
            "error": status.as_u16(),
            "message": message,
        }));
        (status, body).into_response()
    }
}

async fn list_drinks(State(menu): State<AppState>) -> Json<Value> {
    let menu = menu.read().await;
    let drinks: Vec<_> = menu.drinks.values().map(Drink::short).collect();
    Json(json!({"success": true, "drinks": drinks}))
}

async fn drinks_detail(_claims: Claims, State(menu): State<AppState>) -> Json<Value> {
    let menu = menu.read().await;
    let drinks: Vec<_> = menu.drinks.values().map(Drink::long).collect();
    Json(json!({"success": true, "drinks": drinks}))
}

async fn create_drink(
    claims: Claims,
    State(menu): State<AppState>,
    payload: Result<Json<DrinkRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::Unprocessable)?;

    let mut menu = menu.write().await;
    let drink = menu.create(request)?;
    info!(id = drink.id, title = %drink.title, subject = ?claims.subject(), "drink created");

    Ok(Json(json!({"success": true, "drinks": [drink.long()]})))
}

async fn patch_drink(
    claims: Claims,
    State(menu): State<AppState>,
    Path(id): Path<u64>,
    payload: Result<Json<DrinkRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::Unprocessable)?;

    let mut menu = menu.write().await;
    let drink = menu.update(id, request)?;
    info!(id, subject = ?claims.subject(), "drink updated");

    Ok(Json(json!({"success": true, "drinks": [drink.long()]})))
}

async fn delete_drink(
    claims: Claims,
    State(menu): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    menu.write().await.remove(id)?;
    info!(id, subject = ?claims.subject(), "drink deleted");

    Ok(Json(json!({"success": true, "delete": id})))
}

fn build_router(authorizer: &Authorizer, state: AppState) -> Router {
    Router::new()
        .route(
            "/drinks",
            get(list_drinks).merge(post(create_drink).route_layer(authorizer.require("post:drinks"))),
        )
        .route(
            "/drinks-detail",
            get(drinks_detail).route_layer(authorizer.require("get:drinks-detail")),
        )
        .route(
            "/drinks/{id}",
            patch(patch_drink)
                .route_layer(authorizer.require("patch:drinks"))
                .merge(delete(delete_drink).route_layer(authorizer.require("delete:drinks"))),
        )
        .fallback(|| async { ApiError::NotFound })
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AuthConfig::from_env()?;
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5000);

    let authorizer = Authorizer::from_config(&config);
    let app = build_router(&authorizer, AppState::default());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, issuer = %config.issuer(), audience = %config.audience, "coffee shop listening");
    axum::serve(listener, app).await?;
    Ok(())
}
