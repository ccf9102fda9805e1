//! GET /api/v1/: discovery root listing every API entry point.

use axum::{extract::State, http::HeaderMap, Extension, Json};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{
    categories::CATEGORIES_PATH, map_db_error, products::PRODUCTS_PATH, ApiError, ApiResponse,
    AppState, ResponseMeta,
};

// Served by the account, cart and order services.
const AUTH_LOGIN_PATH: &str = "/api/v1/auth/token/";
const AUTH_REFRESH_PATH: &str = "/api/v1/auth/token/refresh/";
const USER_CHECKOUT_PATH: &str = "/api/v1/user/checkout/";
const ADDRESS_LIST_PATH: &str = "/api/v1/user/address/";
const ADDRESS_CREATE_PATH: &str = "/api/v1/user/address/create/";
const CART_PATH: &str = "/api/v1/cart/";
const CHECKOUT_PATH: &str = "/api/v1/checkout/";
const CHECKOUT_FINALIZE_PATH: &str = "/api/v1/checkout/finalize/";
const ORDERS_PATH: &str = "/api/v1/orders/";

#[derive(Debug, Serialize)]
pub(super) struct ApiHome {
    auth: AuthLinks,
    address: AddressLinks,
    checkout: CheckoutLinks,
    products: CountedLink,
    categories: CountedLink,
    orders: Link,
}

#[derive(Debug, Serialize)]
struct AuthLinks {
    login_url: String,
    refresh_url: String,
    user_checkout: String,
}

#[derive(Debug, Serialize)]
struct AddressLinks {
    url: String,
    create: String,
}

#[derive(Debug, Serialize)]
struct CheckoutLinks {
    cart: String,
    checkout: String,
    finalize: String,
}

#[derive(Debug, Serialize)]
struct CountedLink {
    count: i64,
    url: String,
}

#[derive(Debug, Serialize)]
struct Link {
    url: String,
}

pub(super) async fn api_home(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<ApiHome>>, ApiError> {
    let rid = &req_id.0;
    let products = storefront_db::count_products(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let categories = storefront_db::count_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let base = state.base_url(&headers);
    let url = |path: &str| format!("{base}{path}");

    let data = ApiHome {
        auth: AuthLinks {
            login_url: url(AUTH_LOGIN_PATH),
            refresh_url: url(AUTH_REFRESH_PATH),
            user_checkout: url(USER_CHECKOUT_PATH),
        },
        address: AddressLinks {
            url: url(ADDRESS_LIST_PATH),
            create: url(ADDRESS_CREATE_PATH),
        },
        checkout: CheckoutLinks {
            cart: url(CART_PATH),
            checkout: url(CHECKOUT_PATH),
            finalize: url(CHECKOUT_FINALIZE_PATH),
        },
        products: CountedLink {
            count: products,
            url: url(PRODUCTS_PATH),
        },
        categories: CountedLink {
            count: categories,
            url: url(CATEGORIES_PATH),
        },
        orders: Link {
            url: url(ORDERS_PATH),
        },
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
