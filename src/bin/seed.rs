use apparel_shop_api::{
    config::AppConfig,
    db::{DbPool, create_pool, orm_from_pool, run_migrations},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm_from_pool(&pool)).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "Admin", "admin123", true).await?;
    let user_id = ensure_user(&pool, "user@example.com", "Shopper", "user123", false).await?;
    seed_products(&pool, &config.public_base_url).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &DbPool,
    email: &str,
    name: &str,
    password: &str,
    is_admin: bool,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, name, password_hash, is_admin)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET is_admin = EXCLUDED.is_admin
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(is_admin)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (admin={is_admin})");
    Ok(user_id)
}

async fn seed_products(pool: &DbPool, base_url: &str) -> anyhow::Result<()> {
    let products = [
        ("Classic Crew Tee", "tee", "M", "short", "white", 19900),
        ("Ferris Graphic Tee", "tee", "L", "short", "orange", 24900),
        ("Oxford Button-Down", "shirt", "M", "long", "blue", 45900),
        ("Linen Camp Shirt", "shirt", "S", "short", "beige", 39900),
        ("Heavyweight Hoodie", "hoodie", "XL", "long", "black", 55000),
        ("Striped Polo", "polo", "M", "short", "navy", 29900),
    ];

    for (title, category, size, sleeve, color, price) in products {
        let public_id = Uuid::new_v4().to_string();
        let images = serde_json::json!([{
            "url": format!("{}/uploads/{public_id}.jpg", base_url.trim_end_matches('/')),
            "public_id": public_id,
        }]);
        sqlx::query(
            r#"
            INSERT INTO products (id, title, category, size, sleeve, color, price, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (title) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(category)
        .bind(size)
        .bind(sleeve)
        .bind(color)
        .bind(price as i64)
        .bind(images)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
