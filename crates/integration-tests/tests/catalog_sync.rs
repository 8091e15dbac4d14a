//! Integration tests for the periodic catalog sync.
//!
//! Every scenario drives `SyncRunner` over the in-memory fakes.

use vitrine_admin::erp::{ErpError, ProductDetail};
use vitrine_admin::models::{
    CanonicalProduct, NewProduct, NewVariant, PolicyError, SyncPolicy,
};
use vitrine_admin::sync::{SyncAction, SyncError, SyncRequest};
use vitrine_admin::testing::{WriteCounts, new_product, new_variant};
use vitrine_core::{ErpId, ListingFormat, Sku, SyncOutcome};
use vitrine_integration_tests::{
    TestContext, branco_child_detail, brl, laura_detail, max_detail, seed_laura_listing,
};

fn linked_product(name: &str, slug: &str, external_id: i64) -> NewProduct {
    NewProduct {
        external_product_id: Some(ErpId::new(external_id)),
        ..new_product(name, slug, brl(10000))
    }
}

fn product_linked_to(ctx: &TestContext, external_id: i64) -> CanonicalProduct {
    ctx.store
        .products()
        .into_iter()
        .find(|p| p.external_product_id == Some(ErpId::new(external_id)))
        .expect("product linked to external id")
}

fn permissive() -> SyncPolicy {
    SyncPolicy::default()
        .begin_first_import()
        .expect("fresh policy allows a first import")
}

// ============================================================================
// Full sync
// ============================================================================

#[tokio::test]
async fn test_sandalia_laura_end_to_end() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    assert_eq!(summary.total_groups, 2);
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.next_offset, None);
    assert_eq!(ctx.store.products().len(), 2);

    let laura = product_linked_to(&ctx, 501);
    assert_eq!(laura.name, "Sandália Laura");
    assert_eq!(laura.slug, "sandalia-laura");

    let mut colors: Vec<(Option<String>, Option<String>, i32, Option<ErpId>)> = ctx
        .store
        .variants_of(laura.id)
        .into_iter()
        .map(|v| (v.color, v.color_hex, v.stock_quantity, v.external_variant_id))
        .collect();
    colors.sort();
    assert_eq!(
        colors,
        vec![
            (
                Some("Branco".to_string()),
                Some("#FFFFFF".to_string()),
                2,
                Some(ErpId::new(1002))
            ),
            (
                Some("Preto".to_string()),
                Some("#000000".to_string()),
                4,
                Some(ErpId::new(1001))
            ),
        ]
    );

    let max = product_linked_to(&ctx, 2000);
    assert_eq!(max.name, "Tênis Max");
    let variants = ctx.store.variants_of(max.id);
    assert_eq!(variants.len(), 1);
    let unico = variants.first().expect("default variant");
    assert_eq!(unico.size, "Único");
    assert_eq!(unico.stock_quantity, 7);
}

#[tokio::test]
async fn test_second_sync_is_idempotent() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    let runner = ctx.runner();
    let request = SyncRequest::new(SyncAction::SyncProducts);

    runner.run(&request).await.expect("first sync");
    let writes = ctx.store.writes();

    let summary = runner.run(&request).await.expect("second sync");
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.updated, 2);
    assert_eq!(ctx.store.products().len(), 2);
    assert_eq!(ctx.store.writes(), writes);
}

#[tokio::test]
async fn test_stock_only_policy_leaves_content_alone() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    let runner = ctx.runner();
    let request = SyncRequest::new(SyncAction::SyncProducts);

    runner.run(&request).await.expect("first sync");
    let laura = product_linked_to(&ctx, 501);
    let max = product_linked_to(&ctx, 2000);
    let writes = ctx.store.writes();

    // The ERP renames, rewrites and restocks both products
    let mut renamed = laura_detail();
    renamed.name = "Sandália Laura Verão".to_string();
    renamed.description = Some("Nova coleção".to_string());
    for v in &mut renamed.variations {
        v.stock = Some(9);
    }
    ctx.source.add_detail(renamed);
    ctx.source.add_detail(ProductDetail {
        name: "Tênis Max Pro".to_string(),
        description: Some("Solado novo".to_string()),
        stock: Some(1),
        ..max_detail()
    });

    let summary = runner.run(&request).await.expect("second sync");
    assert_eq!(summary.errors, 0);

    for before in [&laura, &max] {
        let after = ctx.store.product(before.id).expect("product kept");
        assert_eq!(after.name, before.name);
        assert_eq!(after.description, before.description);
        assert_eq!(after.is_active, before.is_active);
    }
    assert!(ctx.store.variants_of(laura.id).iter().all(|v| v.stock_quantity == 9));
    assert!(ctx.store.variants_of(max.id).iter().all(|v| v.stock_quantity == 1));
    assert_eq!(
        ctx.store.writes(),
        WriteCounts {
            variant_stock: writes.variant_stock + 3,
            ..writes
        }
    );
}

#[tokio::test]
async fn test_unresolvable_variations_keep_default_variant() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    // Another product already holds both variation links
    let other = ctx.store.seed_product(&new_product("Chinelo", "chinelo", brl(4990)));
    for external_id in [1001, 1002] {
        ctx.store.seed_variant(&NewVariant {
            external_variant_id: Some(ErpId::new(external_id)),
            ..new_variant(other.id, &external_id.to_string())
        });
    }

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    let report = summary
        .log
        .iter()
        .find(|r| r.external_id == ErpId::new(501))
        .expect("laura reported");
    assert_eq!(report.status, SyncOutcome::Imported);
    assert_eq!(report.variants, 1);

    let laura = product_linked_to(&ctx, 501);
    let variants = ctx.store.variants_of(laura.id);
    assert_eq!(variants.len(), 1);
    let unico = variants.first().expect("default variant");
    assert_eq!(unico.size, "Único");
    assert_eq!(unico.external_variant_id, None);
    assert_eq!(ctx.store.variants_of(other.id).len(), 2);
}

#[tokio::test]
async fn test_windowed_sync_follows_next_offset() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    let runner = ctx.runner();

    let first = runner
        .run(&SyncRequest {
            limit: Some(1),
            ..SyncRequest::new(SyncAction::SyncProducts)
        })
        .await
        .expect("first window");
    assert_eq!(first.processed, 1);
    assert_eq!(first.next_offset, Some(1));

    let second = runner
        .run(&SyncRequest {
            offset: 1,
            limit: Some(1),
            ..SyncRequest::new(SyncAction::SyncProducts)
        })
        .await
        .expect("second window");
    assert_eq!(second.processed, 1);
    assert_eq!(second.next_offset, None);
    assert_eq!(ctx.store.products().len(), 2);
}

#[tokio::test]
async fn test_only_new_skips_linked_groups() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    ctx.store
        .seed_product(&linked_product("Sandália Laura", "sandalia-laura", 501));

    let summary = ctx
        .runner()
        .run(&SyncRequest {
            only_new: true,
            ..SyncRequest::new(SyncAction::SyncProducts)
        })
        .await
        .expect("sync succeeds");

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.imported, 1);
    assert!(!ctx.source.detail_calls().contains(&ErpId::new(501)));
}

#[tokio::test]
async fn test_listed_child_redirects_to_parent() {
    let ctx = TestContext::new();
    ctx.source
        .list(1002, "Sandália Laura Cor: Branco", ListingFormat::Simple);
    ctx.source.add_detail(laura_detail());
    ctx.source.add_detail(branco_child_detail());

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    assert_eq!(summary.imported, 1);
    let laura = product_linked_to(&ctx, 501);
    assert_eq!(laura.name, "Sandália Laura");
    assert_eq!(ctx.store.variants_of(laura.id).len(), 2);
    assert!(
        ctx.store
            .products()
            .iter()
            .all(|p| p.external_product_id != Some(ErpId::new(1002)))
    );
}

#[tokio::test]
async fn test_missing_detail_fails_only_its_group() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    ctx.source.list(3000, "Bolsa Tiracolo", ListingFormat::Simple);

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    assert_eq!(summary.imported, 2);
    assert_eq!(summary.errors, 1);
    let failed = summary
        .log
        .iter()
        .find(|r| r.status == SyncOutcome::Error)
        .expect("error entry");
    assert_eq!(failed.external_id, ErpId::new(3000));
    assert!(failed.message.is_some());
}

#[tokio::test]
async fn test_unlinked_erp_aborts_run() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    ctx.source.unlink();

    let result = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await;

    assert!(matches!(result, Err(SyncError::Erp(ErpError::NotLinked))));
    assert!(ctx.store.products().is_empty());
}

// ============================================================================
// Policy
// ============================================================================

#[tokio::test]
async fn test_import_disabled_skips_new_products() {
    let ctx = TestContext::with_policy(SyncPolicy {
        import_new_products: false,
        ..SyncPolicy::default()
    });
    seed_laura_listing(&ctx.source);

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    assert_eq!(summary.skipped, 2);
    assert!(ctx.store.products().is_empty());
    assert_eq!(ctx.store.writes().total(), 0);
}

#[tokio::test]
async fn test_inactive_product_is_never_written() {
    let ctx = TestContext::with_policy(permissive());
    let laura = laura_detail();
    ctx.source
        .list(1001, "Sandália Laura (501) Cor: Preto", ListingFormat::Simple);
    ctx.source.add_detail(laura);

    let product = ctx
        .store
        .seed_product(&linked_product("Sandália Laura antiga", "sandalia-laura", 501));
    ctx.store.seed_variant(&new_variant(product.id, "Único"));
    ctx.store.deactivate_product(product.id);

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    assert_eq!(summary.ignored_inactive, 1);
    assert_eq!(ctx.store.writes().total(), 0);
    let unchanged = ctx.store.product(product.id).expect("product kept");
    assert_eq!(unchanged.name, "Sandália Laura antiga");
    assert!(!unchanged.is_active);
}

#[tokio::test]
async fn test_first_import_links_existing_product_by_sku() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);

    let existing = ctx
        .store
        .seed_product(&new_product("Sandália Laura Couro", "sandalia-laura-couro", brl(15000)));
    let preto = ctx.store.seed_variant(&NewVariant {
        sku: Sku::parse("SL-PT").ok(),
        color: Some("Preto".to_string()),
        ..new_variant(existing.id, "Único")
    });

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::FirstImport))
        .await
        .expect("first import succeeds");

    assert_eq!(summary.linked_by_sku, 1);
    assert_eq!(summary.imported, 1);
    assert!(summary.first_import_completed);

    let linked = ctx.store.product(existing.id).expect("product kept");
    assert_eq!(linked.external_product_id, Some(ErpId::new(501)));
    assert_eq!(linked.name, "Sandália Laura");
    assert_eq!(linked.base_price, brl(18990));

    let relinked = ctx.store.variant(preto.id).expect("variant kept");
    assert_eq!(relinked.external_variant_id, Some(ErpId::new(1001)));
    assert_eq!(relinked.stock_quantity, 4);
    assert_eq!(ctx.store.variants_of(existing.id).len(), 2);
}

#[tokio::test]
async fn test_first_import_state_machine() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    let runner = ctx.runner();

    // A partial window keeps the permissive policy in place
    let partial = runner
        .run(&SyncRequest {
            limit: Some(1),
            ..SyncRequest::new(SyncAction::FirstImport)
        })
        .await
        .expect("first window");
    assert!(!partial.first_import_completed);
    assert!(ctx.store.policy().sync_titles);
    assert!(!ctx.store.policy().first_import_done);

    let last = runner
        .run(&SyncRequest {
            offset: 1,
            ..SyncRequest::new(SyncAction::FirstImport)
        })
        .await
        .expect("last window");
    assert!(last.first_import_completed);

    let policy = ctx.store.policy();
    assert!(policy.first_import_done);
    assert!(policy.sync_stock);
    assert!(!policy.sync_titles);
    assert!(!policy.import_new_products);
    assert!(!policy.merge_by_sku);

    let again = runner
        .run(&SyncRequest::new(SyncAction::FirstImport))
        .await;
    assert!(matches!(
        again,
        Err(SyncError::Policy(PolicyError::FirstImportAlreadyDone))
    ));
}

// ============================================================================
// Cleanup
// ============================================================================

#[tokio::test]
async fn test_cleanup_purges_products_imported_from_variations() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);

    let stray = ctx
        .store
        .seed_product(&linked_product("Sandália Laura Branco", "sandalia-laura-branco", 1002));
    ctx.store.seed_variant(&new_variant(stray.id, "Único"));
    let kept = ctx
        .store
        .seed_product(&linked_product("Sandália Laura Preto", "sandalia-laura-preto", 1001));
    ctx.store.deactivate_product(kept.id);

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    assert_eq!(summary.cleaned, 1);
    assert!(ctx.store.product(stray.id).is_none());
    assert!(ctx.store.variants_of(stray.id).is_empty());
    assert!(ctx.store.product(kept.id).is_some());
}

#[tokio::test]
async fn test_cleanup_only_run() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    let stray = ctx
        .store
        .seed_product(&linked_product("Sandália Laura Preto", "sandalia-laura-preto", 1001));

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::CleanupVariations))
        .await
        .expect("cleanup succeeds");

    assert_eq!(summary.cleaned, 1);
    assert_eq!(summary.processed, 0);
    assert!(ctx.store.product(stray.id).is_none());
    assert_eq!(ctx.store.writes().product_inserts, 0);
}

// ============================================================================
// Images
// ============================================================================

#[tokio::test]
async fn test_images_rehosted_with_erp_link_fallback() {
    let ctx = TestContext::new();
    ctx.source.list(2000, "Tênis Max", ListingFormat::Simple);
    ctx.source.add_detail(ProductDetail {
        image_urls: vec![
            "https://cdn.erp.test/max/1.jpg?X-Amz-Signature=abc".to_string(),
            "https://cdn.erp.test/max/2.jpg?X-Amz-Signature=def".to_string(),
        ],
        ..max_detail()
    });
    ctx.source.add_image(
        "https://cdn.erp.test/max/1.jpg?X-Amz-Signature=abc",
        b"\xFF\xD8\xFF\xE0jpeg",
        "image/jpeg",
    );

    ctx.runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    let max = product_linked_to(&ctx, 2000);
    let urls: Vec<String> = ctx.store.images_of(max.id).into_iter().map(|i| i.url).collect();
    assert_eq!(urls.len(), 2);
    assert!(urls.first().is_some_and(|u| u.starts_with("https://blobs.test/")));
    assert_eq!(
        urls.get(1).map(String::as_str),
        Some("https://cdn.erp.test/max/2.jpg")
    );
    assert_eq!(ctx.blobs.uploads().len(), 1);
}

#[tokio::test]
async fn test_failed_upload_keeps_erp_link() {
    let ctx = TestContext::new();
    ctx.source.list(2000, "Tênis Max", ListingFormat::Simple);
    ctx.source.add_detail(ProductDetail {
        image_urls: vec!["https://cdn.erp.test/max/1.jpg?sig=1".to_string()],
        ..max_detail()
    });
    ctx.source
        .add_image("https://cdn.erp.test/max/1.jpg?sig=1", b"png", "image/png");
    ctx.blobs.fail_uploads();

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    assert_eq!(summary.imported, 1);
    let max = product_linked_to(&ctx, 2000);
    let images = ctx.store.images_of(max.id);
    assert_eq!(images.len(), 1);
    assert_eq!(
        images.first().map(|i| i.url.as_str()),
        Some("https://cdn.erp.test/max/1.jpg")
    );
}

// ============================================================================
// Stock refresh and relink
// ============================================================================

#[tokio::test]
async fn test_stock_refresh_batches_at_most_fifty_ids() {
    let ctx = TestContext::new();
    for n in 0..120 {
        let external_id = 5000 + n;
        let product = ctx.store.seed_product(&linked_product(
            &format!("Meia {n}"),
            &format!("meia-{n}"),
            external_id,
        ));
        ctx.store.seed_variant(&new_variant(product.id, "Único"));
        ctx.source.set_balance(external_id, 3);
    }

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncStock))
        .await
        .expect("stock sync succeeds");

    assert_eq!(summary.processed, 120);
    assert_eq!(summary.stock_updated, 120);
    assert_eq!(summary.next_offset, None);
    assert_eq!(ctx.source.stock_batches(), vec![50, 50, 20]);
    assert!(ctx
        .store
        .products()
        .iter()
        .flat_map(|p| ctx.store.variants_of(p.id))
        .all(|v| v.stock_quantity == 3));
}

#[tokio::test]
async fn test_stock_refresh_respects_policy() {
    let ctx = TestContext::with_policy(SyncPolicy {
        sync_stock: false,
        ..SyncPolicy::default()
    });
    let product = ctx
        .store
        .seed_product(&linked_product("Meia", "meia", 5000));
    ctx.store.seed_variant(&new_variant(product.id, "Único"));
    ctx.source.set_balance(5000, 9);

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncStock))
        .await
        .expect("stock sync succeeds");

    assert_eq!(summary.stock_updated, 0);
    assert!(ctx.source.stock_batches().is_empty());
}

#[tokio::test]
async fn test_stock_refresh_writes_deleted_products_only_on_restock() {
    let ctx = TestContext::new();
    let empty = ctx.store.seed_product(&linked_product("Meia", "meia", 5000));
    let empty_variant = ctx.store.seed_variant(&NewVariant {
        stock_quantity: 2,
        ..new_variant(empty.id, "Único")
    });
    let restocked = ctx.store.seed_product(&linked_product("Boné", "bone", 5001));
    let restocked_variant = ctx.store.seed_variant(&new_variant(restocked.id, "Único"));
    for product in [&empty, &restocked] {
        ctx.store.deactivate_product_by_sync(product.id);
    }
    ctx.source.set_balance(5000, 0);
    ctx.source.set_balance(5001, 6);

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::SyncStock))
        .await
        .expect("stock sync succeeds");

    assert_eq!(summary.stock_updated, 1);
    let empty = ctx.store.product(empty.id).expect("product kept");
    assert!(!empty.is_active);
    assert_eq!(
        ctx.store.variant(empty_variant.id).map(|v| v.stock_quantity),
        Some(2)
    );

    assert!(ctx.store.product(restocked.id).expect("product kept").is_active);
    let variant = ctx.store.variant(restocked_variant.id).expect("variant kept");
    assert!(variant.is_active);
    assert_eq!(variant.stock_quantity, 6);
}

#[tokio::test]
async fn test_relink_backfills_variant_links_by_sku() {
    let ctx = TestContext::new();
    ctx.source.add_detail(laura_detail());
    let product = ctx
        .store
        .seed_product(&linked_product("Sandália Laura", "sandalia-laura", 501));
    let branco = ctx.store.seed_variant(&NewVariant {
        sku: Sku::parse("SL-BR").ok(),
        ..new_variant(product.id, "Único")
    });

    let summary = ctx
        .runner()
        .run(&SyncRequest::new(SyncAction::RelinkVariants))
        .await
        .expect("relink succeeds");

    assert_eq!(summary.relinked, 1);
    assert_eq!(
        ctx.store.variant(branco.id).and_then(|v| v.external_variant_id),
        Some(ErpId::new(1002))
    );
}

#[tokio::test]
async fn test_debug_product_shows_parent_and_local_state() {
    let ctx = TestContext::new();
    seed_laura_listing(&ctx.source);
    let runner = ctx.runner();
    runner
        .run(&SyncRequest::new(SyncAction::SyncProducts))
        .await
        .expect("sync succeeds");

    let summary = runner
        .run(&SyncRequest {
            external_id: Some(ErpId::new(1002)),
            ..SyncRequest::new(SyncAction::DebugProduct)
        })
        .await
        .expect("debug succeeds");

    let debug = summary.debug.expect("debug payload");
    assert_eq!(debug["detail"]["id"], 1002);
    assert_eq!(debug["parent"]["id"], 501);
    assert_eq!(debug["local"]["product"]["name"], "Sandália Laura");
    assert_eq!(debug["local"]["variant"]["color"], "Branco");

    let missing = runner
        .run(&SyncRequest::new(SyncAction::DebugProduct))
        .await;
    assert!(matches!(missing, Err(SyncError::InvalidRequest(_))));
}
