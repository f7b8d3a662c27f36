//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use tof::{Manager, ThreadLocale};
use tof_test_utils::{TestTof, product_type};

/// `(origin, en, fr, price)` for each catalogue product, in id order.
pub const CATALOGUE: &[(&str, &str, &str, i64)] = &[
    ("Chair", "Chair", "Chaise", 40),
    ("Desk", "Desk", "Bureau", 120),
    ("Lamp", "Lamp", "Lampe", 25),
];

/// Seeded handle with `shop.product.title` translatable and the
/// [`CATALOGUE`] saved with English and French titles.
pub async fn catalogue() -> TestTof {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;
    let objects = products(&app);

    for (origin, en, fr, price) in CATALOGUE {
        let mut product = app.create_product(origin, *price).await;
        product.set("title", *en).unwrap();
        {
            let _fr = ThreadLocale::activate("fr");
            product.set("title", *fr).unwrap();
        }
        objects.save(&mut product).await.unwrap();
    }
    app
}

/// Default manager of `shop.product`.
pub fn products(app: &TestTof) -> Manager {
    app.tof.objects(&product_type()).unwrap()
}
