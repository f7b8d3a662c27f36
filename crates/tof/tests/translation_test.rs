//! Integration tests for activating translatable fields and storing
//! translations through instances.

mod common;

use serde_json::json;
use tof::{FieldValue, ThreadLocale, TofError, TranslatableText};
use tof_test_utils::{TestTof, post_type, product_type};

use common::products;

// ============================================================================
// Activation
// ============================================================================

#[tokio::test]
async fn adding_a_field_activates_it() {
    let app = TestTof::seeded().await;
    assert!(!products(&app).is_translation_aware());

    app.translate_product("title").await;

    let class = app.tof.class(&product_type()).unwrap();
    assert!(class.has_translations());
    assert!(class.translated_field("title").is_some());
    assert!(class.translated_field("price").is_none());
    assert!(products(&app).is_translation_aware());

    let origin = app.tof.manager(&product_type(), "objects_origin").unwrap();
    assert!(!origin.is_translation_aware());

    let fields = app.tof.translatable_fields().await.unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].id, "shop.product.title");
    assert_eq!(fields[0].title, "title");
}

#[tokio::test]
async fn adding_a_field_twice_changes_nothing() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;
    let before = app.tof.class(&product_type()).unwrap().snapshot();

    app.translate_product("title").await;

    let class = app.tof.class(&product_type()).unwrap();
    assert_eq!(class.snapshot(), before);
    assert_eq!(app.tof.translatable_fields().await.unwrap().len(), 1);
}

#[tokio::test]
async fn other_models_are_untouched() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;

    let posts = app.tof.class(&post_type()).unwrap();
    assert!(!posts.has_translations());
    assert!(!app.tof.objects(&post_type()).unwrap().is_translation_aware());
}

#[tokio::test]
async fn undeclared_fields_are_rejected_before_saving() {
    let app = TestTof::seeded().await;

    let err = app
        .tof
        .add_translatable_field(&product_type(), "colour", "")
        .await
        .unwrap_err();
    assert!(matches!(err, TofError::UnknownField { .. }));

    let err = app
        .tof
        .add_translatable_field(&product_type(), "id", "")
        .await
        .unwrap_err();
    assert!(matches!(err, TofError::UnknownField { .. }));

    assert!(app.tof.translatable_fields().await.unwrap().is_empty());
    assert!(!app.tof.class(&product_type()).unwrap().has_translations());
}

#[tokio::test]
async fn unregistered_models_are_rejected() {
    let app = TestTof::seeded().await;
    let order = "shop.order".parse().unwrap();

    let err = app
        .tof
        .add_translatable_field(&order, "note", "")
        .await
        .unwrap_err();
    assert!(matches!(err, TofError::UnknownModel(_)));
}

#[tokio::test]
async fn removing_a_field_restores_the_class() {
    let app = TestTof::seeded().await;
    let before = app.tof.class(&product_type()).unwrap().snapshot();
    app.translate_product("title").await;

    let mut chair = app.create_product("Chair", 40).await;
    {
        let _fr = ThreadLocale::activate("fr");
        chair.set("title", "Chaise").unwrap();
    }
    products(&app).save(&mut chair).await.unwrap();
    assert_eq!(app.backend.translation_count(), 1);

    assert!(
        app.tof
            .remove_translatable_field(&product_type(), "title")
            .await
            .unwrap()
    );

    let class = app.tof.class(&product_type()).unwrap();
    assert_eq!(class.snapshot(), before);
    assert_eq!(app.backend.translation_count(), 0);
    assert!(!products(&app).is_translation_aware());
    assert!(matches!(
        app.tof.manager(&product_type(), "objects_origin"),
        Err(TofError::NotFound(_))
    ));

    assert!(
        !app.tof
            .remove_translatable_field(&product_type(), "title")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn removing_a_field_keeps_stored_values() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;
    let mut chair = app.create_product("Chair", 40).await;
    let id = chair.id().unwrap();
    let mut loaded = products(&app).get([("id", id)]).await.unwrap();

    app.tof
        .remove_translatable_field(&product_type(), "title")
        .await
        .unwrap();

    assert_eq!(chair.get("title").unwrap(), FieldValue::Value(json!("Chair")));
    assert_eq!(loaded.get("title").unwrap(), FieldValue::Value(json!("Chair")));

    let objects = products(&app);
    objects.save(&mut chair).await.unwrap();
    objects.save(&mut loaded).await.unwrap();
    let mut reloaded = objects.get([("id", id)]).await.unwrap();
    assert_eq!(
        reloaded.get("title").unwrap(),
        FieldValue::Value(json!("Chair"))
    );
}

#[tokio::test]
async fn removing_one_of_two_fields_keeps_the_other_active() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;
    app.translate_product("description").await;

    app.tof
        .remove_translatable_field(&product_type(), "title")
        .await
        .unwrap();

    let class = app.tof.class(&product_type()).unwrap();
    assert!(class.has_translations());
    assert!(class.translated_field("title").is_none());
    assert!(class.translated_field("description").is_some());
    assert!(products(&app).is_translation_aware());
}

// ============================================================================
// Instances
// ============================================================================

#[tokio::test]
async fn construction_writes_the_origin_slot() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;

    let mut chair = products(&app)
        .instance([("title", "Chair")])
        .unwrap();
    let text = chair.text("title").unwrap();
    assert_eq!(text.origin(), Some("Chair"));
    assert_eq!(text.languages().count(), 0);

    chair.set("title", "Armchair").unwrap();
    let text = chair.text("title").unwrap();
    assert_eq!(text.origin(), Some("Chair"));
    assert_eq!(text.get("en"), Some("Armchair"));
}

#[tokio::test]
async fn save_writes_one_row_per_language() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;
    let objects = products(&app);

    let mut chair = app.create_product("Chair", 40).await;
    assert_eq!(app.backend.translation_count(), 0);

    chair.set("title", "Chair (en)").unwrap();
    {
        let _fr = ThreadLocale::activate("fr");
        chair.set("title", "Chaise").unwrap();
    }
    let id = objects.save(&mut chair).await.unwrap();
    assert_eq!(app.backend.translation_count(), 2);

    // Saving again updates in place.
    chair.set("title", "Chair").unwrap();
    objects.save(&mut chair).await.unwrap();
    assert_eq!(app.backend.translation_count(), 2);

    let mut loaded = objects.get([("id", id)]).await.unwrap();
    let title = loaded.text("title").unwrap();
    assert_eq!(title.origin(), Some("Chair"));
    assert_eq!(title.get("en"), Some("Chair"));
    assert_eq!(title.get("fr"), Some("Chaise"));
    assert_eq!(loaded.get("price").unwrap(), FieldValue::Value(json!(40)));
}

#[tokio::test]
async fn display_falls_back_to_the_origin_value() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;

    let mut chair = app.create_product("Chair", 40).await;
    {
        let _fr = ThreadLocale::activate("fr");
        chair.set("title", "Chaise").unwrap();
    }
    let id = products(&app).save(&mut chair).await.unwrap();

    let mut loaded = products(&app).get([("id", id)]).await.unwrap();
    {
        let _fr = ThreadLocale::activate("fr");
        assert_eq!(loaded.display("title").unwrap(), "Chaise");
    }
    {
        let _de = ThreadLocale::activate("de");
        assert_eq!(loaded.display("title").unwrap(), "Chair");
    }
    assert_eq!(loaded.display("price").unwrap(), "40");
}

#[tokio::test]
async fn assigning_a_whole_text_replaces_it() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;

    let mut lamp = app.create_product("Lamp", 25).await;
    let text = TranslatableText::with_origin("Lamp")
        .with("fr", "Lampe")
        .with("de", "Lampe");
    lamp.set("title", text.clone()).unwrap();
    assert_eq!(lamp.text("title").unwrap(), text);

    products(&app).save(&mut lamp).await.unwrap();
    assert_eq!(app.backend.translation_count(), 2);
}

#[tokio::test]
async fn unknown_language_fails_the_save() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;

    let mut chair = app.create_product("Chair", 40).await;
    {
        let _it = ThreadLocale::activate("it");
        chair.set("title", "Sedia").unwrap();
    }
    let err = products(&app).save(&mut chair).await.unwrap_err();
    assert!(matches!(err, TofError::UnknownLanguage(ref lang) if lang == "it"));
}

#[tokio::test]
async fn origin_manager_does_not_prefetch() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;

    let mut chair = app.create_product("Chair", 40).await;
    {
        let _fr = ThreadLocale::activate("fr");
        chair.set("title", "Chaise").unwrap();
    }
    let id = products(&app).save(&mut chair).await.unwrap();

    let origin = app.tof.manager(&product_type(), "objects_origin").unwrap();
    let mut raw = origin.get([("id", id)]).await.unwrap();
    let title = raw.text("title").unwrap();
    assert_eq!(title.origin(), Some("Chair"));
    assert_eq!(title.get("fr"), None);

    let mut lazy = origin.get([("id", id)]).await.unwrap();
    lazy.load_translations(app.tof.backend().as_ref())
        .await
        .unwrap();
    assert_eq!(lazy.text("title").unwrap().get("fr"), Some("Chaise"));
}

#[tokio::test]
async fn deleting_a_record_deletes_its_translations() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;
    let objects = products(&app);

    let mut chair = app.create_product("Chair", 40).await;
    chair.set("title", "Chair").unwrap();
    objects.save(&mut chair).await.unwrap();
    let mut lamp = app.create_product("Lamp", 25).await;
    lamp.set("title", "Lamp").unwrap();
    objects.save(&mut lamp).await.unwrap();
    assert_eq!(app.backend.translation_count(), 2);

    assert!(objects.delete(&mut chair).await.unwrap());
    assert_eq!(chair.id(), None);
    assert_eq!(app.backend.translation_count(), 1);
    assert_eq!(objects.count().await.unwrap(), 1);
}

#[tokio::test]
async fn plain_fields_are_not_texts() {
    let app = TestTof::seeded().await;
    app.translate_product("title").await;

    let mut chair = app.create_product("Chair", 40).await;
    assert!(matches!(
        chair.text("price"),
        Err(TofError::NotTranslatable(_))
    ));
    assert!(matches!(
        chair.get("colour"),
        Err(TofError::UnknownField { .. })
    ));
}
