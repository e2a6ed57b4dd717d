use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{
            AddToCartRequest, BulkCartUpdateRequest, BulkCartUpdateResult, CartItemDto, CartList,
            UpdateQuantityRequest, UpdateSelectionRequest,
        },
        images::DestroyResult,
        products::{CreateProductRequest, ProductList, UpdateProductRequest, ViewCount},
        users::UpdateProfileRequest,
    },
    models::{CartItem, Product, ProductImage, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, images, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        users::get_profile,
        users::update_profile,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_many,
        cart::update_quantity,
        cart::update_selection,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::increment_views,
        products::delete_product,
        images::upload_image,
        images::destroy_image
    ),
    components(
        schemas(
            User,
            Product,
            ProductImage,
            CartItem,
            CartItemDto,
            CartList,
            AddToCartRequest,
            BulkCartUpdateRequest,
            BulkCartUpdateResult,
            UpdateQuantityRequest,
            UpdateSelectionRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            ViewCount,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            DestroyResult,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "User", description = "Current user profile"),
        (name = "Products", description = "Catalog browsing and admin product management"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Images", description = "Product image upload and removal"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
