//! End-to-end orchestrator scenarios over the in-memory store and scripted
//! mock backends.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use zousui_sim::orchestrator::SimSettings;
use zousui_sim::{
    AggregatingGenerator, AggregationMode, Interrupt, LlmBackend, MockBackend, PromptEngine,
    RequestContext, SimError, SimulationDeps, Simulator,
};
use zousui_store::{
    CommunityRepository, EntityStore, MemoryAgentStore, MemoryCommunityStore,
    MemorySimulationStore, StoreError,
};
use zousui_types::{Agent, Community, CommunityId, SIMULATION_KIND_DIPLOMACY};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

fn simulator(store: &EntityStore, backend: &MockBackend) -> Simulator {
    let prompts = Arc::new(PromptEngine::builtin().unwrap());
    let generator = AggregatingGenerator::new(
        vec![LlmBackend::Mock(backend.clone())],
        AggregationMode::Synthesize,
        Arc::clone(&prompts),
    )
    .unwrap()
    .with_rng(StdRng::seed_from_u64(11));

    Simulator::new(SimulationDeps {
        store: store.clone(),
        generator: Arc::new(generator),
        prompts,
        settings: Arc::new(SimSettings::default()),
    })
}

fn store_with(communities: &[Community]) -> EntityStore {
    let store = EntityStore::in_memory();
    for community in communities {
        store.communities.save(community).unwrap();
    }
    store
}

fn id(raw: &str) -> CommunityId {
    CommunityId::new(raw)
}

fn ctx() -> RequestContext {
    RequestContext::background()
}

// ---------------------------------------------------------------------------
// Evolution and single-community interference
// ---------------------------------------------------------------------------

#[tokio::test]
async fn evolution_applies_structured_result() {
    let store = store_with(&[Community::new("comm-1", "DesertTribe", 100, "desert survival")]);
    store
        .agents
        .save(&Agent::new("agent-1", "Aisha", "comm-1", "curious"))
        .unwrap();
    let backend = MockBackend::fixed(
        "mock",
        r#"{"newCulture":"festival of dance","populationChange":15}"#,
    );
    let sim = simulator(&store, &backend);

    let returned = sim.evolve(&ctx(), &id("comm-1")).await.unwrap();

    let stored = store.communities.get(&id("comm-1")).unwrap();
    assert_eq!(stored.culture, "festival of dance");
    assert_eq!(stored.population, 115);
    assert_eq!(returned, stored);

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].prompt.contains("DesertTribe"));
    assert!(calls[0].prompt.contains("Aisha (personality: curious)"));
}

#[tokio::test]
async fn evolution_appends_unstructured_text() {
    let store = store_with(&[Community::new("comm-1", "DesertTribe", 100, "desert survival")]);
    let backend = MockBackend::fixed("mock", "The tribe began to paint the dunes.");
    let sim = simulator(&store, &backend);

    sim.evolve(&ctx(), &id("comm-1")).await.unwrap();

    let stored = store.communities.get(&id("comm-1")).unwrap();
    assert_eq!(
        stored.culture,
        "desert survival | The tribe began to paint the dunes."
    );
    assert_eq!(stored.population, 100);
}

#[tokio::test]
async fn evolution_of_missing_community_calls_no_backend() {
    let store = EntityStore::in_memory();
    let backend = MockBackend::new("mock");
    let sim = simulator(&store, &backend);

    let result = sim.evolve(&ctx(), &id("ghost")).await;

    assert!(matches!(result, Err(SimError::NotFound(_))));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn interference_passes_user_input_and_clamps() {
    let store = store_with(&[Community::new("comm-1", "DesertTribe", 20, "desert survival")]);
    let backend = MockBackend::fixed(
        "mock",
        "```json\n{\"newCulture\": \"comet worship\", \"populationChange\": -40}\n```",
    );
    let sim = simulator(&store, &backend);

    sim.interfere(&ctx(), &id("comm-1"), Some("a comet strikes"))
        .await
        .unwrap();

    let stored = store.communities.get(&id("comm-1")).unwrap();
    assert_eq!(stored.culture, "comet worship");
    assert_eq!(stored.population, 0);

    let calls = backend.calls();
    assert_eq!(calls[0].auxiliary, "a comet strikes");
    assert!(calls[0].prompt.contains("multiple intelligences"));
}

#[tokio::test]
async fn interference_appends_raw_text_with_marker() {
    let store = store_with(&[Community::new("comm-1", "DesertTribe", 100, "desert survival")]);
    let backend = MockBackend::fixed("mock", "Strange lights filled the sky.");
    let sim = simulator(&store, &backend);

    sim.interfere(&ctx(), &id("comm-1"), None).await.unwrap();

    let stored = store.communities.get(&id("comm-1")).unwrap();
    assert_eq!(stored.culture, "desert survival | Strange lights filled the sky.");
    assert_eq!(stored.population, 100);
}

#[tokio::test]
async fn unstructured_text_keeps_its_whitespace() {
    let store = store_with(&[Community::new("comm-1", "DesertTribe", 100, "old")]);
    let backend = MockBackend::fixed("mock", "  They sang.\n\n");
    let sim = simulator(&store, &backend);

    sim.evolve(&ctx(), &id("comm-1")).await.unwrap();

    let stored = store.communities.get(&id("comm-1")).unwrap();
    assert_eq!(stored.culture, "old |   They sang.\n\n");
    assert_eq!(stored.population, 100);
}

// ---------------------------------------------------------------------------
// Diplomacy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn diplomacy_clamps_negative_population() {
    let store = store_with(&[
        Community::new("comm-a", "DesertTribe", 100, "sand"),
        Community::new("comm-b", "OceanicCity", 10, "sea"),
    ]);
    let backend = MockBackend::fixed(
        "mock",
        r#"{"outcome":"war","description":"a border clash","popChangeA":-5,"popChangeB":-50}"#,
    );
    let sim = simulator(&store, &backend);

    let round = sim.diplomacy(&ctx(), &id("comm-a"), &id("comm-b")).await.unwrap();

    let a = store.communities.get(&id("comm-a")).unwrap();
    let b = store.communities.get(&id("comm-b")).unwrap();
    assert_eq!(a.population, 95);
    assert_eq!(b.population, 0);
    assert_eq!(a.culture, "sand | a border clash");
    assert_eq!(b.culture, "sea | a border clash");

    let history = store.simulations.get_all().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, SIMULATION_KIND_DIPLOMACY);
    assert_eq!(history[0].id, round.record.id);
    assert_eq!(history[0].communities, vec![id("comm-a"), id("comm-b")]);
}

#[tokio::test]
async fn diplomacy_with_unknown_outcome_is_applied_the_same_way() {
    let store = store_with(&[
        Community::new("comm-a", "DesertTribe", 100, "sand"),
        Community::new("comm-b", "OceanicCity", 300, "sea"),
    ]);
    let backend = MockBackend::fixed(
        "mock",
        r#"{"outcome":"cultural exchange","description":"they swapped songs","popChangeA":2,"popChangeB":3}"#,
    );
    let sim = simulator(&store, &backend);

    let round = sim.diplomacy(&ctx(), &id("comm-a"), &id("comm-b")).await.unwrap();

    assert_eq!(round.report.outcome.as_str(), "cultural exchange");
    assert_eq!(round.a.population, 102);
    assert_eq!(round.b.culture, "sea | they swapped songs");
}

#[tokio::test]
async fn diplomacy_parse_failure_changes_nothing() {
    let sand = Community::new("comm-a", "DesertTribe", 100, "sand");
    let sea = Community::new("comm-b", "OceanicCity", 300, "sea");
    let store = store_with(&[sand.clone(), sea.clone()]);
    let backend = MockBackend::fixed("mock", "They had a long talk.");
    let sim = simulator(&store, &backend);

    let result = sim.diplomacy(&ctx(), &id("comm-a"), &id("comm-b")).await;

    assert!(matches!(result, Err(SimError::Parse(_))));
    assert_eq!(store.communities.get(&id("comm-a")).unwrap(), sand);
    assert_eq!(store.communities.get(&id("comm-b")).unwrap(), sea);
    assert!(store.simulations.get_all().unwrap().is_empty());
}

#[tokio::test]
async fn two_party_flows_reject_same_community() {
    let store = store_with(&[Community::new("comm-a", "DesertTribe", 100, "sand")]);
    let backend = MockBackend::new("mock");
    let sim = simulator(&store, &backend);

    let diplomacy = sim.diplomacy(&ctx(), &id("comm-a"), &id("comm-a")).await;
    let pair = sim
        .interfere_pair(&ctx(), &id("comm-a"), &id("comm-a"), "")
        .await;

    assert!(matches!(diplomacy, Err(SimError::InvalidInput(_))));
    assert!(matches!(pair, Err(SimError::InvalidInput(_))));
    assert_eq!(backend.call_count(), 0);
}

// ---------------------------------------------------------------------------
// Two-community interference
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pair_interference_falls_back_to_side_a() {
    let sea = Community::new("comm-b", "OceanicCity", 300, "sea");
    let store = store_with(&[
        Community::new("comm-a", "DesertTribe", 100, "sand"),
        sea.clone(),
    ]);
    let backend = MockBackend::fixed("mock", r#"{"newCulture":"X","populationChange":5}"#);
    let sim = simulator(&store, &backend);

    let outcome = sim
        .interfere_pair(&ctx(), &id("comm-a"), &id("comm-b"), "a tidal wave")
        .await
        .unwrap();

    let a = store.communities.get(&id("comm-a")).unwrap();
    assert_eq!(a.culture, "X");
    assert_eq!(a.population, 105);
    assert_eq!(store.communities.get(&id("comm-b")).unwrap(), sea);

    assert_eq!(outcome.record.kind, "interference");
    assert_eq!(outcome.record.communities, vec![id("comm-a"), id("comm-b")]);
    let recorded: serde_json::Value = serde_json::from_str(&outcome.record.result_json).unwrap();
    assert_eq!(recorded["newCultureA"], "X");
    assert_eq!(backend.calls()[0].auxiliary, "a tidal wave");
}

#[tokio::test]
async fn pair_interference_applies_both_sides() {
    let store = store_with(&[
        Community::new("comm-a", "DesertTribe", 100, "sand"),
        Community::new("comm-b", "OceanicCity", 300, "sea"),
    ]);
    let backend = MockBackend::fixed(
        "mock",
        r#"{"newCultureA":"sand sailors","populationChangeA":10,"newCultureB":"desert divers","populationChangeB":-20}"#,
    );
    let sim = simulator(&store, &backend);

    let outcome = sim
        .interfere_pair(&ctx(), &id("comm-a"), &id("comm-b"), "")
        .await
        .unwrap();

    assert_eq!(outcome.a.culture, "sand sailors");
    assert_eq!(outcome.b.population, 280);
    assert_eq!(store.simulations.get_all().unwrap().len(), 1);
}

#[tokio::test]
async fn pair_interference_unrecoverable_output_is_fatal() {
    let sand = Community::new("comm-a", "DesertTribe", 100, "sand");
    let store = store_with(&[sand.clone(), Community::new("comm-b", "OceanicCity", 300, "sea")]);
    let backend = MockBackend::fixed("mock", "Both communities felt uneasy.");
    let sim = simulator(&store, &backend);

    let result = sim
        .interfere_pair(&ctx(), &id("comm-a"), &id("comm-b"), "")
        .await;

    assert!(matches!(result, Err(SimError::Parse(_))));
    assert_eq!(store.communities.get(&id("comm-a")).unwrap(), sand);
    assert!(store.simulations.get_all().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn merge_with_unparsable_output_concatenates_cultures() {
    let store = store_with(&[
        Community::new("comm-a", "DesertTribe", 100, "desert survival"),
        Community::new("comm-b", "OceanicCity", 300, "undersea song"),
    ]);
    let backend = MockBackend::fixed("mock", "They simply became one people.");
    let sim = simulator(&store, &backend);

    let merged = sim
        .merge(&ctx(), &id("comm-a"), &id("comm-b"), &id("comm-ab"), "DuneSea")
        .await
        .unwrap();

    assert_eq!(merged.population, 400);
    assert_eq!(merged.culture, "desert survival + undersea song");
    assert_eq!(merged.description, "Merged from DesertTribe and OceanicCity");

    let all = store.communities.get_all().unwrap();
    let ids: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["comm-ab"]);
}

#[tokio::test]
async fn merge_uses_structured_culture() {
    let store = store_with(&[
        Community::new("comm-a", "DesertTribe", 100, "sand"),
        Community::new("comm-b", "OceanicCity", 300, "sea"),
    ]);
    let backend = MockBackend::fixed("mock", r#"{"mergedCulture":"tidal nomads"}"#);
    let sim = simulator(&store, &backend);

    let merged = sim
        .merge(&ctx(), &id("comm-a"), &id("comm-b"), &id("comm-ab"), "DuneSea")
        .await
        .unwrap();

    assert_eq!(merged.culture, "tidal nomads");
    assert_eq!(store.communities.get(&id("comm-ab")).unwrap(), merged);
}

#[tokio::test]
async fn merge_into_taken_id_is_rejected_before_generation() {
    let store = store_with(&[
        Community::new("comm-a", "DesertTribe", 100, "sand"),
        Community::new("comm-b", "OceanicCity", 300, "sea"),
    ]);
    let backend = MockBackend::new("mock");
    let sim = simulator(&store, &backend);

    let result = sim
        .merge(&ctx(), &id("comm-a"), &id("comm-b"), &id("comm-b"), "Taken")
        .await;

    assert!(matches!(result, Err(SimError::AlreadyExists(_))));
    assert_eq!(backend.call_count(), 0);
    assert_eq!(store.communities.get_all().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Persistence failures
// ---------------------------------------------------------------------------

/// Community repository that refuses to write one identifier.
#[derive(Debug, Default)]
struct FlakyCommunities {
    inner: MemoryCommunityStore,
    refuse: Option<CommunityId>,
}

impl FlakyCommunities {
    fn refusing(id: &str) -> Self {
        Self {
            inner: MemoryCommunityStore::new(),
            refuse: Some(CommunityId::new(id)),
        }
    }

    fn check(&self, id: &CommunityId) -> Result<(), StoreError> {
        if self.refuse.as_ref() == Some(id) {
            return Err(StoreError::Backend("disk full".to_owned()));
        }
        Ok(())
    }
}

impl CommunityRepository for FlakyCommunities {
    fn get(&self, id: &CommunityId) -> Result<Community, StoreError> {
        self.inner.get(id)
    }

    fn save(&self, community: &Community) -> Result<(), StoreError> {
        self.check(&community.id)?;
        self.inner.save(community)
    }

    fn insert(&self, community: &Community) -> Result<(), StoreError> {
        self.check(&community.id)?;
        self.inner.insert(community)
    }

    fn get_all(&self) -> Result<Vec<Community>, StoreError> {
        self.inner.get_all()
    }

    fn delete(&self, id: &CommunityId) -> Result<(), StoreError> {
        self.check(id)?;
        self.inner.delete(id)
    }
}

fn flaky_store(refuse: &str, seed: &[Community]) -> EntityStore {
    let communities = FlakyCommunities::refusing(refuse);
    for community in seed {
        communities.inner.save(community).unwrap();
    }
    EntityStore::new(
        Arc::new(communities),
        Arc::new(MemoryAgentStore::new()),
        Arc::new(MemorySimulationStore::new()),
    )
}

#[tokio::test]
async fn failed_second_save_keeps_first_and_reports_persistence() {
    let store = flaky_store(
        "comm-b",
        &[
            Community::new("comm-a", "DesertTribe", 100, "sand"),
            Community::new("comm-b", "OceanicCity", 300, "sea"),
        ],
    );
    let backend = MockBackend::fixed(
        "mock",
        r#"{"outcome":"trade","description":"caravans meet ships","popChangeA":4,"popChangeB":6}"#,
    );
    let sim = simulator(&store, &backend);

    let result = sim.diplomacy(&ctx(), &id("comm-a"), &id("comm-b")).await;

    assert!(matches!(result, Err(SimError::Persistence(StoreError::Backend(_)))));
    assert_eq!(store.communities.get(&id("comm-a")).unwrap().population, 104);
    assert_eq!(store.communities.get(&id("comm-b")).unwrap().population, 300);
    assert!(store.simulations.get_all().unwrap().is_empty());
}

#[tokio::test]
async fn failed_source_delete_keeps_merge_result() {
    let store = flaky_store(
        "comm-b",
        &[
            Community::new("comm-a", "DesertTribe", 100, "sand"),
            Community::new("comm-b", "OceanicCity", 300, "sea"),
        ],
    );
    let backend = MockBackend::fixed("mock", r#"{"mergedCulture":"tidal nomads"}"#);
    let sim = simulator(&store, &backend);

    let result = sim
        .merge(&ctx(), &id("comm-a"), &id("comm-b"), &id("comm-ab"), "DuneSea")
        .await;

    assert!(matches!(result, Err(SimError::Persistence(_))));
    let ids: Vec<String> = store
        .communities
        .get_all()
        .unwrap()
        .into_iter()
        .map(|c| c.id.to_string())
        .collect();
    assert_eq!(ids, vec!["comm-ab", "comm-b"]);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_request_leaves_store_untouched() {
    let sand = Community::new("comm-1", "DesertTribe", 100, "sand");
    let store = store_with(&[sand.clone()]);
    let backend = MockBackend::new("mock").delayed(Duration::from_secs(3600));
    let sim = simulator(&store, &backend);
    let (ctx, handle) = RequestContext::with_cancel();

    let comm_id = id("comm-1");
    let call = sim.evolve(&ctx, &comm_id);
    let cancel = async {
        tokio::task::yield_now().await;
        handle.cancel();
    };
    let (result, ()) = tokio::join!(call, cancel);

    assert!(matches!(result, Err(SimError::Interrupted(Interrupt::Cancelled))));
    assert_eq!(store.communities.get(&id("comm-1")).unwrap(), sand);
}

#[tokio::test]
async fn already_cancelled_request_reads_nothing() {
    let store = EntityStore::in_memory();
    let backend = MockBackend::new("mock");
    let sim = simulator(&store, &backend);
    let (ctx, handle) = RequestContext::with_cancel();
    handle.cancel();

    let result = sim.evolve(&ctx, &id("anything")).await;

    assert!(matches!(result, Err(SimError::Interrupted(Interrupt::Cancelled))));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_exceeded_surfaces_as_interrupted() {
    let store = store_with(&[
        Community::new("comm-a", "DesertTribe", 100, "sand"),
        Community::new("comm-b", "OceanicCity", 300, "sea"),
    ]);
    let backend = MockBackend::new("mock").delayed(Duration::from_secs(120));
    let sim = simulator(&store, &backend);
    let ctx = RequestContext::background().with_timeout(Duration::from_secs(5));

    let result = sim
        .merge(&ctx, &id("comm-a"), &id("comm-b"), &id("comm-ab"), "DuneSea")
        .await;

    assert!(matches!(
        result,
        Err(SimError::Interrupted(Interrupt::DeadlineExceeded))
    ));
    assert_eq!(store.communities.get_all().unwrap().len(), 2);
}
