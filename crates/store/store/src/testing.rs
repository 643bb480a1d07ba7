//! Backend-agnostic conformance suite.
//!
//! Every backend calls [`run_repository_conformance_tests`] from its own tests
//! with a fresh, empty repository.

use chrono::{DateTime, Duration, TimeZone, Utc};

use hololith_core::{
    AnalyticsEvent, ExploreKind, ExploreQuery, ExploreSort, MemberRole, Membership, MembershipId,
    Page, PageContent, PageId, PlanDraft, Product, ProductId, PublishStatus, Quotas, Store,
    StoreId, SubscriptionStatus, Tag, TagId, Tenant, TenantId, User, UserId, ViewEventType,
    ViewTarget,
};

use crate::error::StoreError;
use crate::repository::Repository;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

fn user(email: &str) -> User {
    User {
        id: UserId::generate(),
        email: email.to_owned(),
        password_hash: "hash".to_owned(),
        refresh_token_hash: None,
        created_at: base_time(),
    }
}

async fn tenant(repo: &dyn Repository, name: &str) -> Result<(Tenant, User), StoreError> {
    let owner = user(&format!("{name}@example.com"));
    repo.create_user(&owner).await?;
    let tenant = Tenant {
        id: TenantId::generate(),
        name: name.to_owned(),
        owner_id: owner.id.clone(),
        created_at: base_time(),
    };
    let membership = Membership {
        id: MembershipId::generate(),
        tenant_id: tenant.id.clone(),
        user_id: owner.id.clone(),
        role: MemberRole::TenantAdmin,
        created_at: base_time(),
    };
    repo.create_tenant(&tenant, &membership).await?;
    Ok((tenant, owner))
}

fn store(tenant: &TenantId, slug: &str, minutes: i64) -> Store {
    let at = base_time() + Duration::minutes(minutes);
    Store {
        id: StoreId::generate(),
        tenant_id: tenant.clone(),
        name: format!("Store {slug}"),
        slug: slug.to_owned(),
        subdomain: slug.to_owned(),
        custom_domain: None,
        status: PublishStatus::Draft,
        created_at: at,
        updated_at: at,
    }
}

fn product(store: &StoreId, slug: &str, price_cents: i64, minutes: i64) -> Product {
    let at = base_time() + Duration::minutes(minutes);
    Product {
        id: ProductId::generate(),
        store_id: store.clone(),
        title: format!("Product {slug}"),
        slug: slug.to_owned(),
        description: Some(format!("about {slug}")),
        price_cents,
        currency: "USD".to_owned(),
        media: serde_json::json!([]),
        status: PublishStatus::Draft,
        created_at: at,
        updated_at: at,
    }
}

fn page(store: &StoreId, slug: &str) -> Page {
    Page {
        id: PageId::generate(),
        store_id: store.clone(),
        title: format!("Page {slug}"),
        slug: slug.to_owned(),
        content: PageContent {
            version: serde_json::Number::from(1u32),
            blocks: vec![serde_json::json!({ "kind": "text" })],
            extra: serde_json::Map::from_iter([("layout".to_owned(), serde_json::json!("wide"))]),
        },
        status: PublishStatus::Draft,
        created_at: base_time(),
        updated_at: base_time(),
    }
}

fn tag(slug: &str, tier: u8) -> Tag {
    Tag {
        id: TagId::generate(),
        slug: slug.to_owned(),
        name: slug.to_uppercase(),
        tier,
        flags: serde_json::json!({}),
        created_at: base_time(),
    }
}

fn explore(kind: ExploreKind, sort: ExploreSort) -> ExploreQuery {
    ExploreQuery::normalized(None, None, kind, sort, None, None)
}

/// Run the full repository conformance suite.
///
/// # Errors
///
/// Returns an error if any repository call fails unexpectedly. Assertion
/// failures panic.
pub async fn run_repository_conformance_tests(repo: &dyn Repository) -> Result<(), StoreError> {
    repo.ping().await?;
    test_plans(repo).await?;
    test_subscriptions(repo).await?;
    test_users(repo).await?;
    test_tenants(repo).await?;
    test_store_uniqueness(repo).await?;
    test_products(repo).await?;
    test_pages(repo).await?;
    test_tags(repo).await?;
    test_explore(repo).await?;
    test_event_dedup(repo).await?;
    test_view_aggregates(repo).await?;
    Ok(())
}

async fn test_plans(repo: &dyn Repository) -> Result<(), StoreError> {
    let free = PlanDraft::free();
    let created = repo.get_or_create_plan(&free).await?;
    let mut altered = free.clone();
    altered.name = "Changed".to_owned();
    let again = repo.get_or_create_plan(&altered).await?;
    assert_eq!(created.id, again.id, "get_or_create must reuse the plan");
    assert_eq!(again.name, "Free", "get_or_create must not modify existing plan");

    let mut bigger = free.clone();
    bigger.quotas = Quotas {
        max_stores: 7,
        ..free.quotas
    };
    let upserted = repo.upsert_plan(&bigger).await?;
    assert_eq!(upserted.id, created.id, "upsert must keep identity by code");
    assert_eq!(upserted.quotas.max_stores, 7);
    repo.upsert_plan(&free).await?;

    for draft in PlanDraft::paid_tiers() {
        repo.upsert_plan(&draft).await?;
    }
    let plans = repo.list_plans().await?;
    let codes: Vec<_> = plans.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, ["free", "starter", "pro", "business"]);

    let pro = repo.get_plan_by_code("pro").await?;
    assert_eq!(pro.as_ref().map(|p| p.quotas.max_tag_tier), Some(3));
    let by_id = repo.get_plan(&created.id).await?;
    assert_eq!(by_id.map(|p| p.code), Some("free".to_owned()));
    assert!(repo.get_plan_by_code("missing").await?.is_none());
    Ok(())
}

async fn test_subscriptions(repo: &dyn Repository) -> Result<(), StoreError> {
    let (tenant, _) = tenant(repo, "subs").await?;
    let free = repo.get_or_create_plan(&PlanDraft::free()).await?;
    assert!(repo.get_subscription(&tenant.id).await?.is_none());

    let sub = repo.get_or_create_subscription(&tenant.id, &free.id).await?;
    assert_eq!(sub.plan_id, free.id);
    assert_eq!(sub.status, SubscriptionStatus::Active);
    let again = repo.get_or_create_subscription(&tenant.id, &free.id).await?;
    assert_eq!(sub.id, again.id, "one subscription per tenant");

    let pro = repo
        .get_plan_by_code("pro")
        .await?
        .ok_or_else(|| StoreError::NotFound("pro".into()))?;
    let moved = repo.set_subscription_plan(&tenant.id, &pro.id).await?;
    assert_eq!(moved.id, sub.id);
    assert_eq!(moved.plan_id, pro.id);

    let missing = repo
        .set_subscription_plan(&TenantId::generate(), &pro.id)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
    Ok(())
}

async fn test_users(repo: &dyn Repository) -> Result<(), StoreError> {
    let alice = user("alice@example.com");
    repo.create_user(&alice).await?;
    let dup = repo.create_user(&user("alice@example.com")).await;
    assert!(matches!(dup, Err(StoreError::Conflict(_))), "email must be unique");

    let found = repo.find_user_by_email("alice@example.com").await?;
    assert_eq!(found.map(|u| u.id), Some(alice.id.clone()));

    repo.set_refresh_token_hash(&alice.id, Some("r1")).await?;
    let loaded = repo.get_user(&alice.id).await?;
    assert_eq!(loaded.and_then(|u| u.refresh_token_hash), Some("r1".to_owned()));
    repo.set_refresh_token_hash(&alice.id, None).await?;
    let cleared = repo.get_user(&alice.id).await?;
    assert_eq!(cleared.and_then(|u| u.refresh_token_hash), None);
    Ok(())
}

async fn test_tenants(repo: &dyn Repository) -> Result<(), StoreError> {
    let (acme, owner) = tenant(repo, "acme").await?;
    let loaded = repo.get_tenant(&acme.id).await?;
    assert_eq!(loaded.map(|t| t.name), Some("acme".to_owned()));

    let membership = repo.get_membership(&acme.id, &owner.id).await?;
    assert_eq!(membership.map(|m| m.role), Some(MemberRole::TenantAdmin));

    let stranger = user("stranger@example.com");
    repo.create_user(&stranger).await?;
    assert!(repo.get_membership(&acme.id, &stranger.id).await?.is_none());

    let mine = repo.list_memberships(&owner.id).await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].1.id, acme.id);
    Ok(())
}

async fn test_store_uniqueness(repo: &dyn Repository) -> Result<(), StoreError> {
    let (a, _) = tenant(repo, "store-a").await?;
    let (b, _) = tenant(repo, "store-b").await?;

    let first = store(&a.id, "alpha", 0);
    repo.insert_store(&first).await?;

    let slug_clash = Store {
        subdomain: "other".into(),
        ..store(&b.id, "alpha", 1)
    };
    assert!(matches!(
        repo.insert_store(&slug_clash).await,
        Err(StoreError::Conflict(_))
    ));

    let sub_clash = Store {
        slug: "beta".into(),
        ..store(&b.id, "alpha", 1)
    };
    assert!(matches!(
        repo.insert_store(&sub_clash).await,
        Err(StoreError::Conflict(_))
    ));

    let second = store(&a.id, "gamma", 5);
    repo.insert_store(&second).await?;
    assert_eq!(repo.count_stores(&a.id).await?, 2);
    assert_eq!(repo.count_stores(&b.id).await?, 0);

    let listed = repo.list_stores(&a.id).await?;
    assert_eq!(listed[0].id, second.id, "stores list newest first");

    let mut renamed = second.clone();
    renamed.slug = "alpha".into();
    assert!(matches!(
        repo.update_store(&renamed).await,
        Err(StoreError::Conflict(_))
    ));
    renamed.slug = "gamma-2".into();
    renamed.status = PublishStatus::Published;
    repo.update_store(&renamed).await?;
    let by_slug = repo.find_store_by_slug("gamma-2").await?;
    assert_eq!(by_slug.map(|s| s.status), Some(PublishStatus::Published));
    assert!(repo.find_store_by_slug("gamma").await?.is_none());
    assert!(repo.find_store_by_subdomain("gamma").await?.is_some());

    let ghost = store(&a.id, "ghost", 0);
    assert!(matches!(
        repo.update_store(&ghost).await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}

async fn test_products(repo: &dyn Repository) -> Result<(), StoreError> {
    let (t, _) = tenant(repo, "products").await?;
    let s1 = store(&t.id, "prod-one", 0);
    let s2 = store(&t.id, "prod-two", 1);
    repo.insert_store(&s1).await?;
    repo.insert_store(&s2).await?;

    let p1 = product(&s1.id, "mug", 500, 0);
    repo.insert_product(&p1).await?;
    assert!(matches!(
        repo.insert_product(&product(&s1.id, "mug", 1, 1)).await,
        Err(StoreError::Conflict(_))
    ));
    let p2 = product(&s2.id, "mug", 700, 2);
    repo.insert_product(&p2).await?;

    assert_eq!(repo.count_products_in_store(&s1.id).await?, 1);
    assert_eq!(repo.count_products_for_tenant(&t.id).await?, 2);

    let all = repo.list_products(&t.id, None).await?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, p2.id, "products list newest first");
    let only_s1 = repo.list_products(&t.id, Some(&s1.id)).await?;
    assert_eq!(only_s1.len(), 1);

    let found = repo.find_product_by_slug(&s2.id, "mug").await?;
    assert_eq!(found.map(|p| p.id), Some(p2.id.clone()));

    assert!(repo.list_published_products(&s1.id).await?.is_empty());
    let mut published = p1.clone();
    published.status = PublishStatus::Published;
    repo.update_product(&published).await?;
    assert_eq!(repo.list_published_products(&s1.id).await?.len(), 1);
    assert_eq!(
        repo.get_product(&p1.id).await?.map(|p| p.status),
        Some(PublishStatus::Published)
    );
    Ok(())
}

async fn test_pages(repo: &dyn Repository) -> Result<(), StoreError> {
    let (t, _) = tenant(repo, "pages").await?;
    let s = store(&t.id, "page-store", 0);
    repo.insert_store(&s).await?;

    let about = page(&s.id, "about");
    repo.insert_page(&about).await?;
    assert!(matches!(
        repo.insert_page(&page(&s.id, "about")).await,
        Err(StoreError::Conflict(_))
    ));

    let mut edited = about.clone();
    edited.title = "About us".into();
    repo.update_page(&edited).await?;
    let loaded = repo.find_page_by_slug(&s.id, "about").await?;
    assert_eq!(loaded.as_ref().map(|p| p.title.as_str()), Some("About us"));
    assert_eq!(loaded.map(|p| p.content), Some(about.content.clone()));

    assert_eq!(repo.list_pages(&t.id, None).await?.len(), 1);
    assert_eq!(repo.list_pages(&t.id, Some(&StoreId::generate())).await?.len(), 0);
    assert!(repo.get_page(&about.id).await?.is_some());
    Ok(())
}

async fn test_tags(repo: &dyn Repository) -> Result<(), StoreError> {
    let (t, _) = tenant(repo, "tags").await?;
    let mut s = store(&t.id, "tagged", 0);
    repo.insert_store(&s).await?;
    let mut p = product(&s.id, "tagged-item", 100, 0);
    repo.insert_product(&p).await?;

    let gold = tag("gold", 3);
    let apple = tag("apple", 1);
    let zebra = tag("zebra", 1);
    for tg in [&gold, &zebra, &apple] {
        repo.insert_tag(tg).await?;
    }
    assert!(matches!(
        repo.insert_tag(&tag("gold", 1)).await,
        Err(StoreError::Conflict(_))
    ));

    let slugs: Vec<_> = repo.list_tags().await?.into_iter().map(|tg| tg.slug).collect();
    let pos = |slug: &str| slugs.iter().position(|s| s == slug);
    assert!(pos("apple") < pos("zebra"), "tags ordered by name within tier");
    assert!(pos("zebra") < pos("gold"), "tags ordered by tier first");

    assert!(repo.link_store_tag(&s.id, &apple.id).await?);
    assert!(!repo.link_store_tag(&s.id, &apple.id).await?, "link is idempotent");
    assert!(repo.link_product_tag(&p.id, &zebra.id).await?);
    assert_eq!(repo.tags_for_store(&s.id).await?.len(), 1);
    assert_eq!(repo.tags_for_product(&p.id).await?[0].slug, "zebra");

    assert!(repo.published_stores_with_tag(&apple.id).await?.is_empty());
    s.status = PublishStatus::Published;
    repo.update_store(&s).await?;
    assert_eq!(repo.published_stores_with_tag(&apple.id).await?.len(), 1);

    p.status = PublishStatus::Published;
    repo.update_product(&p).await?;
    assert_eq!(repo.published_products_with_tag(&zebra.id).await?.len(), 1);

    assert!(repo.unlink_store_tag(&s.id, &apple.id).await?);
    assert!(!repo.unlink_store_tag(&s.id, &apple.id).await?);
    assert!(repo.unlink_product_tag(&p.id, &zebra.id).await?);
    assert!(repo.tags_for_product(&p.id).await?.is_empty());
    assert_eq!(
        repo.find_tag_by_slug("gold").await?.map(|t| t.id),
        Some(gold.id.clone())
    );
    assert!(repo.get_tag(&TagId::generate()).await?.is_none());
    Ok(())
}

async fn test_explore(repo: &dyn Repository) -> Result<(), StoreError> {
    let (t, _) = tenant(repo, "explore").await?;
    let mut open = store(&t.id, "xp-open-cafe", 10);
    open.status = PublishStatus::Published;
    let hidden = store(&t.id, "xp-hidden-cafe", 20);
    repo.insert_store(&open).await?;
    repo.insert_store(&hidden).await?;

    let mut cheap = product(&open.id, "xp-cheap", 100, 10);
    cheap.status = PublishStatus::Published;
    let mut pricey = product(&open.id, "xp-pricey", 9_000, 20);
    pricey.status = PublishStatus::Published;
    let draft = product(&open.id, "xp-draft", 50, 30);
    let mut orphan = product(&hidden.id, "xp-orphan", 10, 40);
    orphan.status = PublishStatus::Published;
    for p in [&cheap, &pricey, &draft, &orphan] {
        repo.insert_product(p).await?;
    }

    let mut q = explore(ExploreKind::All, ExploreSort::Price);
    q.q = Some("XP-".into());
    let stores = repo.search_stores(&q).await?;
    assert_eq!(stores.len(), 1, "only published stores");
    assert_eq!(stores[0].id, open.id);

    let products = repo.search_products(&q).await?;
    let ids: Vec<_> = products.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, [cheap.id.clone(), pricey.id.clone()], "price ascending, published only");

    q.sort = ExploreSort::New;
    let newest = repo.search_products(&q).await?;
    assert_eq!(newest[0].id, pricey.id);

    q.limit = 1;
    q.offset = 1;
    let paged = repo.search_products(&q).await?;
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].id, cheap.id);

    let label = tag("xp-label", 1);
    repo.insert_tag(&label).await?;
    repo.link_product_tag(&cheap.id, &label.id).await?;
    let mut tagged = explore(ExploreKind::Product, ExploreSort::New);
    tagged.tags = vec!["xp-label".into(), "nonexistent".into()];
    let hits = repo.search_products(&tagged).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, cheap.id);
    assert!(repo.search_stores(&tagged).await?.is_empty());

    let mut described = explore(ExploreKind::Product, ExploreSort::Name);
    described.q = Some("ABOUT XP-PRICEY".into());
    let by_desc = repo.search_products(&described).await?;
    assert_eq!(by_desc.len(), 1);
    Ok(())
}

async fn test_event_dedup(repo: &dyn Repository) -> Result<(), StoreError> {
    let (t, _) = tenant(repo, "dedup").await?;
    let s = store(&t.id, "dedup-store", 0);
    repo.insert_store(&s).await?;
    let target = ViewTarget::Store(s.id.clone());
    let at = base_time();

    let keyed = AnalyticsEvent::for_target(&target, Some("viewer-hash".into()), at);
    let key = keyed.idempotency_key.clone().unwrap_or_default();
    assert!(repo.upsert_event_by_key(&keyed).await?);
    let replay = AnalyticsEvent::for_target(&target, Some("viewer-hash".into()), at);
    assert!(!repo.upsert_event_by_key(&replay).await?, "same key must not insert");
    assert_eq!(repo.count_events_with_key(&key).await?, 1);

    let anonymous = AnalyticsEvent::for_target(&target, None, at);
    assert!(
        repo.upsert_event_by_key(&anonymous).await.is_err(),
        "keyless upsert is rejected"
    );
    repo.insert_event(&anonymous).await?;
    repo.insert_event(&AnalyticsEvent::for_target(&target, None, at))
        .await?;

    let totals = repo.count_views(&t.id, None).await?;
    assert_eq!(totals.store_views, 3);
    Ok(())
}

async fn test_view_aggregates(repo: &dyn Repository) -> Result<(), StoreError> {
    let (t, _) = tenant(repo, "aggregates").await?;
    let (other, _) = tenant(repo, "aggregates-other").await?;
    let s = store(&t.id, "agg-store", 0);
    let s2 = store(&t.id, "agg-store-2", 0);
    let foreign = store(&other.id, "agg-foreign", 0);
    for st in [&s, &s2, &foreign] {
        repo.insert_store(st).await?;
    }
    let p = product(&s.id, "agg-product", 100, 0);
    repo.insert_product(&p).await?;
    let pg = page(&s.id, "agg-page");
    repo.insert_page(&pg).await?;

    let now = base_time();
    let old = now - Duration::days(30);
    let events = [
        (ViewTarget::Store(s.id.clone()), now),
        (ViewTarget::Store(s2.id.clone()), now),
        (ViewTarget::Product(p.id.clone()), now),
        (ViewTarget::Page(pg.id.clone()), now),
        (ViewTarget::Page(pg.id.clone()), old),
        (ViewTarget::Store(foreign.id.clone()), now),
    ];
    for (target, at) in &events {
        repo.insert_event(&AnalyticsEvent::for_target(target, None, *at))
            .await?;
    }

    let lifetime = repo.count_views(&t.id, None).await?;
    assert_eq!(lifetime.store_views, 2);
    assert_eq!(lifetime.product_views, 1);
    assert_eq!(lifetime.page_views, 2);

    let since = now - Duration::days(6);
    let recent = repo.count_views(&t.id, Some(since)).await?;
    assert_eq!(recent.page_views, 1);

    let stamps = repo.view_timestamps(&t.id, since).await?;
    assert_eq!(stamps.len(), 4);
    assert!(stamps.iter().any(|(ty, _)| *ty == ViewEventType::ProductView));

    let per_store = repo.count_store_views(&s.id, since).await?;
    assert_eq!(per_store.store_views, 1);
    assert_eq!(per_store.product_views, 1);
    assert_eq!(per_store.page_views, 1);

    let foreign_totals = repo.count_views(&other.id, None).await?;
    assert_eq!(foreign_totals.store_views, 1);
    assert_eq!(foreign_totals.page_views, 0);
    Ok(())
}
