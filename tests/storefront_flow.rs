use std::sync::{Arc, Mutex, OnceLock};

use apparel_shop_api::{
    db::{create_pool, orm_from_pool, run_migrations},
    dto::{
        cart::{AddToCartRequest, BulkCartUpdateRequest, UpdateQuantityRequest, UpdateSelectionRequest},
        products::{CreateProductRequest, UpdateProductRequest},
    },
    entity::users::ActiveModel as UserActive,
    error::AppError,
    middleware::auth::{AuthUser, JwtKeys},
    models::{Product, ProductImage},
    product_query::ProductQuery,
    services::{cart_service, product_service},
    state::AppState,
    storage::{ImageStore, StorageError},
};
use async_trait::async_trait;
use axum::body::Bytes;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Records destroyed ids instead of touching the filesystem, plus whether a
/// product still referenced the image at the moment it was destroyed.
#[derive(Default)]
struct RecordingStore {
    pool: OnceLock<sqlx::PgPool>,
    destroyed: Mutex<Vec<(String, bool)>>,
}

#[async_trait]
impl ImageStore for RecordingStore {
    async fn upload(&self, _bytes: Bytes, _content_type: &str) -> Result<ProductImage, StorageError> {
        let public_id = Uuid::new_v4().to_string();
        Ok(ProductImage {
            url: format!("http://images.test/{public_id}.png"),
            public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<bool, StorageError> {
        let referenced = match self.pool.get() {
            Some(pool) => {
                let (exists,): (bool,) = sqlx::query_as(
                    "SELECT EXISTS (SELECT 1 FROM products WHERE images @> jsonb_build_array(jsonb_build_object('public_id', $1::text)))",
                )
                .bind(public_id)
                .fetch_one(pool)
                .await
                .unwrap();
                exists
            }
            None => false,
        };
        self.destroyed
            .lock()
            .unwrap()
            .push((public_id.to_string(), referenced));
        Ok(true)
    }
}

// Runs against a real Postgres; every row it creates is namespaced by a fresh uuid.
#[tokio::test]
async fn storefront_flows() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run storefront flow tests."
            );
            return Ok(());
        }
    };

    let images = Arc::new(RecordingStore::default());
    let state = setup_state(&database_url, images.clone()).await?;
    let _ = images.pool.set(state.pool.clone());

    let admin = AuthUser {
        user_id: create_user(&state, "admin", true).await?,
        is_admin: true,
    };
    let shopper = AuthUser {
        user_id: create_user(&state, "shopper", false).await?,
        is_admin: false,
    };

    cart_flow(&state, &images, &admin, &shopper).await?;
    catalog_rules(&state, &admin, &shopper).await?;
    listing_window(&state, &admin).await?;

    Ok(())
}

async fn setup_state(database_url: &str, images: Arc<RecordingStore>) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = orm_from_pool(&pool);
    run_migrations(&orm).await?;
    Ok(AppState {
        pool,
        orm,
        jwt: JwtKeys::new("flow-test-secret", 1),
        images,
    })
}

async fn create_user(state: &AppState, name: &str, is_admin: bool) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{name}-{id}@example.com")),
        name: Set(name.to_string()),
        password_hash: Set("not-a-real-hash".into()),
        is_admin: Set(is_admin),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(id)
}

fn product_request(title: &str, category: &str) -> CreateProductRequest {
    CreateProductRequest {
        title: title.to_string(),
        description: Some("Heavyweight cotton".into()),
        category: category.to_string(),
        size: "M".into(),
        sleeve: "short".into(),
        color: "black".into(),
        price: 2500,
        images: Some(vec![ProductImage {
            url: "http://images.test/front.png".into(),
            public_id: Uuid::new_v4().to_string(),
        }]),
    }
}

async fn create(state: &AppState, admin: &AuthUser, title: &str, category: &str) -> anyhow::Result<Product> {
    let resp = product_service::create_product(state, admin, product_request(title, category)).await?;
    Ok(resp.data.expect("created product"))
}

async fn cart_flow(
    state: &AppState,
    images: &RecordingStore,
    admin: &AuthUser,
    shopper: &AuthUser,
) -> anyhow::Result<()> {
    let run = Uuid::new_v4();
    let product = create(state, admin, &format!("Cart Tee {run}"), &format!("cart-{run}")).await?;
    let add = || AddToCartRequest {
        product_id: product.id,
        size: "M".into(),
    };

    let first = cart_service::add_to_cart(&state.pool, shopper, add()).await?;
    assert_eq!(first.message, "Added new cart item");
    let second = cart_service::add_to_cart(&state.pool, shopper, add()).await?;
    assert_eq!(second.message, "Updated cart item");
    let item = second.data.expect("cart item");
    assert_eq!(item.quantity, 2);
    assert!(item.selected);

    let large = cart_service::add_to_cart(
        &state.pool,
        shopper,
        AddToCartRequest {
            product_id: product.id,
            size: "L".into(),
        },
    )
    .await?
    .data
    .expect("cart item");
    assert_ne!(large.id, item.id);

    let cart = cart_service::list_cart(&state.pool, shopper).await?.data.expect("cart");
    assert_eq!(cart.length, 2);
    assert!(cart.items.iter().all(|i| i.product.id == product.id));

    let missing = cart_service::add_to_cart(
        &state.pool,
        shopper,
        AddToCartRequest {
            product_id: Uuid::new_v4(),
            size: "M".into(),
        },
    )
    .await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    let updated = cart_service::update_quantity(
        &state.pool,
        shopper,
        item.id,
        UpdateQuantityRequest { quantity: 4 },
    )
    .await?;
    assert_eq!(updated.data.flatten().map(|i| i.quantity), Some(4));

    let removed = cart_service::update_quantity(
        &state.pool,
        shopper,
        large.id,
        UpdateQuantityRequest { quantity: 0 },
    )
    .await?;
    assert!(removed.data.flatten().is_none());
    let cart = cart_service::list_cart(&state.pool, shopper).await?.data.expect("cart");
    assert_eq!(cart.length, 1);

    // Another user's token cannot touch the item.
    let stranger = AuthUser {
        user_id: admin.user_id,
        is_admin: true,
    };
    let foreign = cart_service::update_selection(
        &state.pool,
        &stranger,
        item.id,
        UpdateSelectionRequest { selected: false },
    )
    .await;
    assert!(matches!(foreign, Err(AppError::NotFound)));

    let bulk = BulkCartUpdateRequest {
        quantity: [(item.id, 6), (Uuid::new_v4(), 3)].into_iter().collect(),
        selection: [(item.id, false)].into_iter().collect(),
    };
    let result = cart_service::update_many(&state.pool, shopper, bulk)
        .await?
        .data
        .expect("bulk result");
    assert_eq!((result.updated, result.removed, result.selected), (1, 0, 1));

    let cart = cart_service::list_cart(&state.pool, shopper).await?.data.expect("cart");
    assert_eq!(cart.items[0].quantity, 6);
    assert!(!cart.items[0].selected);

    let zero = BulkCartUpdateRequest {
        quantity: [(item.id, 0)].into_iter().collect(),
        ..Default::default()
    };
    let result = cart_service::update_many(&state.pool, shopper, zero)
        .await?
        .data
        .expect("bulk result");
    assert_eq!((result.updated, result.removed, result.selected), (0, 1, 0));
    let cart = cart_service::list_cart(&state.pool, shopper).await?.data.expect("cart");
    assert!(cart.items.iter().all(|i| i.id != item.id));
    assert_eq!(cart.length, 0);

    // Refill so the product delete below has a cart row to cascade.
    cart_service::add_to_cart(&state.pool, shopper, add()).await?;

    let negative = BulkCartUpdateRequest {
        quantity: [(item.id, -1)].into_iter().collect(),
        ..Default::default()
    };
    assert!(matches!(
        cart_service::update_many(&state.pool, shopper, negative).await,
        Err(AppError::BadRequest(_))
    ));

    product_service::delete_product(state, admin, product.id).await?;
    let cart = cart_service::list_cart(&state.pool, shopper).await?.data.expect("cart");
    assert_eq!(cart.length, 0);
    let destroyed = images.destroyed.lock().unwrap().clone();
    assert!(destroyed.contains(&(product.images[0].public_id.clone(), false)));
    assert!(matches!(
        product_service::get_product(state, product.id).await,
        Err(AppError::NotFound)
    ));

    Ok(())
}

async fn catalog_rules(state: &AppState, admin: &AuthUser, shopper: &AuthUser) -> anyhow::Result<()> {
    let run = Uuid::new_v4();
    let category = format!("rules-{run}");
    let first_title = format!("Oxford Shirt {run}");
    let first = create(state, admin, &first_title, &category).await?;

    let duplicate = product_service::create_product(state, admin, product_request(&first_title, &category)).await;
    assert!(matches!(duplicate, Err(AppError::BadRequest(ref m)) if m == "Title already exists."));

    let mut no_images = product_request(&format!("Bare {run}"), &category);
    no_images.images = Some(Vec::new());
    assert!(matches!(
        product_service::create_product(state, admin, no_images).await,
        Err(AppError::BadRequest(ref m)) if m == "Empty image field!"
    ));

    assert!(matches!(
        product_service::create_product(state, shopper, product_request(&format!("Nope {run}"), &category)).await,
        Err(AppError::Forbidden)
    ));

    let second = create(state, admin, &format!("Polo {run}"), &category).await?;
    let steal = UpdateProductRequest {
        title: Some(first_title.clone()),
        ..Default::default()
    };
    assert!(matches!(
        product_service::update_product(state, admin, second.id, steal).await,
        Err(AppError::BadRequest(_))
    ));

    let keep_title = UpdateProductRequest {
        title: Some(first_title.clone()),
        price: Some(1999),
        ..Default::default()
    };
    let kept = product_service::update_product(state, admin, first.id, keep_title)
        .await?
        .data
        .expect("updated product");
    assert_eq!(kept.title, first_title);
    assert_eq!(kept.price, 1999);

    assert!(matches!(
        product_service::update_product(state, admin, Uuid::new_v4(), UpdateProductRequest::default()).await,
        Err(AppError::NotFound)
    ));
    let taken_title_on_missing = UpdateProductRequest {
        title: Some(first_title.clone()),
        ..Default::default()
    };
    assert!(matches!(
        product_service::update_product(state, admin, Uuid::new_v4(), taken_title_on_missing).await,
        Err(AppError::NotFound)
    ));

    product_service::increment_views(state, second.id).await?;
    let views = product_service::increment_views(state, second.id)
        .await?
        .data
        .expect("views");
    assert_eq!(views.views, 2);
    assert!(matches!(
        product_service::increment_views(state, Uuid::new_v4()).await,
        Err(AppError::NotFound)
    ));

    let most_viewed = list(state, &[("category", &category), ("sort", "views:-1")]).await?;
    assert_eq!(most_viewed.0[0].id, second.id);

    let search = list(state, &[("category", &category), ("title[regex]", "oxford")]).await?;
    assert_eq!(search.0.len(), 1);
    assert_eq!(search.0[0].id, first.id);

    Ok(())
}

async fn listing_window(state: &AppState, admin: &AuthUser) -> anyhow::Result<()> {
    let run = Uuid::new_v4();
    let category = format!("window-{run}");
    let other = format!("window-other-{run}");
    for n in 0..15 {
        create(state, admin, &format!("Window Tee {n} {run}"), &category).await?;
    }
    create(state, admin, &format!("Window Polo {run}"), &other).await?;

    let (first_page, total) = list(state, &[("category[in]", &category)]).await?;
    assert_eq!(total, 15);
    assert_eq!(first_page.len(), 13);
    assert!(first_page.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    // Page 2 skips 12 records whatever the limit.
    let (second_page, _) = list(state, &[("category[in]", &category), ("page", "2")]).await?;
    assert_eq!(second_page.len(), 3);
    let (small_page, _) =
        list(state, &[("category[in]", &category), ("page", "2"), ("limit", "2")]).await?;
    assert_eq!(small_page.len(), 2);

    let (oldest, _) = list(state, &[("category[in]", &category), ("sort", "createdAt:1")]).await?;
    assert!(oldest.windows(2).all(|w| w[0].created_at <= w[1].created_at));

    let both = format!("{category},{other}");
    let (_, total) = list(state, &[("category[in]", &both), ("limit", "abc")]).await?;
    assert_eq!(total, 16);

    Ok(())
}

async fn list(state: &AppState, pairs: &[(&str, &str)]) -> anyhow::Result<(Vec<Product>, i64)> {
    let params: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let resp = product_service::list_products(state, ProductQuery::from_params(&params)?).await?;
    let total = resp.meta.and_then(|m| m.total).unwrap_or_default();
    let data = resp.data.expect("product list");
    assert_eq!(data.length, data.products.len());
    Ok((data.products, total))
}
