use std::sync::Arc;

use hrims_core::{AggregateId, DomainError, TenantId};
use hrims_events::{EventBus, EventEnvelope, InMemoryEventBus};
use hrims_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, PostgresEventStore, StoredEvent},
    projections::{
        DepartmentDirectoryProjection, DepartmentReadModel, EmployeeDirectoryProjection,
        EmployeeReadModel, GradeDirectoryProjection, GradeReadModel, LoanBookProjection,
        LoanReadModel, OnboardingReadModel, PositionDirectoryProjection, PositionReadModel,
        PostgresCursorStore,
    },
    read_model::{InMemoryTenantStore, PostgresTenantStore},
};
use hrims_loans::LoanApplicationId;
use hrims_org::{DepartmentId, GradeId, PositionId};
use hrims_people::EmployeeId;
use sqlx::PgPool;

// Type-erased dispatcher for in-memory implementations
type InMemoryDispatcher = CommandDispatcher<
    Arc<InMemoryEventStore>,
    Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>,
>;

// Type-erased dispatcher for persistent implementations. The bus stays
// process-local: projections and their consumers run in this process.
type PersistentDispatcher = CommandDispatcher<
    Arc<PostgresEventStore>,
    Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>,
>;

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        dispatcher: Arc<InMemoryDispatcher>,
        employees_projection: Arc<
            EmployeeDirectoryProjection<Arc<InMemoryTenantStore<EmployeeId, EmployeeReadModel>>>,
        >,
        departments_projection: Arc<
            DepartmentDirectoryProjection<
                Arc<InMemoryTenantStore<DepartmentId, DepartmentReadModel>>,
            >,
        >,
        positions_projection: Arc<
            PositionDirectoryProjection<Arc<InMemoryTenantStore<PositionId, PositionReadModel>>>,
        >,
        grades_projection:
            Arc<GradeDirectoryProjection<Arc<InMemoryTenantStore<GradeId, GradeReadModel>>>>,
        loans_projection:
            Arc<LoanBookProjection<Arc<InMemoryTenantStore<LoanApplicationId, LoanReadModel>>>>,
    },
    Persistent {
        dispatcher: Arc<PersistentDispatcher>,
        employees_projection: Arc<
            EmployeeDirectoryProjection<
                Arc<PostgresTenantStore<EmployeeId, EmployeeReadModel>>,
                PostgresCursorStore,
            >,
        >,
        departments_projection: Arc<
            DepartmentDirectoryProjection<
                Arc<PostgresTenantStore<DepartmentId, DepartmentReadModel>>,
                PostgresCursorStore,
            >,
        >,
        positions_projection: Arc<
            PositionDirectoryProjection<
                Arc<PostgresTenantStore<PositionId, PositionReadModel>>,
                PostgresCursorStore,
            >,
        >,
        grades_projection: Arc<
            GradeDirectoryProjection<
                Arc<PostgresTenantStore<GradeId, GradeReadModel>>,
                PostgresCursorStore,
            >,
        >,
        loans_projection: Arc<
            LoanBookProjection<
                Arc<PostgresTenantStore<LoanApplicationId, LoanReadModel>>,
                PostgresCursorStore,
            >,
        >,
    },
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        return build_persistent_services().await;
    }

    build_in_memory_services()
}

fn build_in_memory_services() -> AppServices {
    // In-memory infra wiring (dev/test): store + bus + projections.
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());

    let employees_store: Arc<InMemoryTenantStore<EmployeeId, EmployeeReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let employees_projection = Arc::new(EmployeeDirectoryProjection::new(employees_store));

    let departments_store: Arc<InMemoryTenantStore<DepartmentId, DepartmentReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let departments_projection = Arc::new(DepartmentDirectoryProjection::new(departments_store));

    let positions_store: Arc<InMemoryTenantStore<PositionId, PositionReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let positions_projection = Arc::new(PositionDirectoryProjection::new(positions_store));

    let grades_store: Arc<InMemoryTenantStore<GradeId, GradeReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let grades_projection = Arc::new(GradeDirectoryProjection::new(grades_store));

    let loans_store: Arc<InMemoryTenantStore<LoanApplicationId, LoanReadModel>> =
        Arc::new(InMemoryTenantStore::new());
    let loans_projection = Arc::new(LoanBookProjection::new(loans_store));

    // Background subscriber: bus -> projections
    {
        let sub = bus.subscribe();
        let employees_projection = employees_projection.clone();
        let departments_projection = departments_projection.clone();
        let positions_projection = positions_projection.clone();
        let grades_projection = grades_projection.clone();
        let loans_projection = loans_projection.clone();
        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(env) => {
                        let apply_ok = match env.aggregate_type() {
                            "people.employee" => employees_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            "org.department" => departments_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            "org.position" => positions_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            "org.grade" => grades_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            "loans.application" => loans_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            _ => Ok(()),
                        };

                        if let Err(e) = apply_ok {
                            tracing::warn!("projection apply failed: {e}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });
    }

    let dispatcher: Arc<InMemoryDispatcher> =
        Arc::new(CommandDispatcher::new(store, bus));
    AppServices::InMemory {
        dispatcher,
        employees_projection,
        departments_projection,
        positions_projection,
        grades_projection,
        loans_projection,
    }
}

async fn build_persistent_services() -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let store = Arc::new(PostgresEventStore::new(pool.clone()));
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());

    let cursor_store = Arc::new(PostgresCursorStore::new(pool.clone()));

    let employees_store: Arc<PostgresTenantStore<EmployeeId, EmployeeReadModel>> =
        Arc::new(PostgresTenantStore::new(pool.clone(), "people.employees"));
    let employees_projection = Arc::new(
        EmployeeDirectoryProjection::new(employees_store)
            .with_persistent_cursors(cursor_store.clone()),
    );

    let departments_store: Arc<PostgresTenantStore<DepartmentId, DepartmentReadModel>> =
        Arc::new(PostgresTenantStore::new(pool.clone(), "org.departments"));
    let departments_projection = Arc::new(
        DepartmentDirectoryProjection::new(departments_store)
            .with_persistent_cursors(cursor_store.clone()),
    );

    let positions_store: Arc<PostgresTenantStore<PositionId, PositionReadModel>> =
        Arc::new(PostgresTenantStore::new(pool.clone(), "org.positions"));
    let positions_projection = Arc::new(
        PositionDirectoryProjection::new(positions_store)
            .with_persistent_cursors(cursor_store.clone()),
    );

    let grades_store: Arc<PostgresTenantStore<GradeId, GradeReadModel>> =
        Arc::new(PostgresTenantStore::new(pool.clone(), "org.grades"));
    let grades_projection = Arc::new(
        GradeDirectoryProjection::new(grades_store).with_persistent_cursors(cursor_store.clone()),
    );

    let loans_store: Arc<PostgresTenantStore<LoanApplicationId, LoanReadModel>> =
        Arc::new(PostgresTenantStore::new(pool.clone(), "loans.book"));
    let loans_projection =
        Arc::new(LoanBookProjection::new(loans_store).with_persistent_cursors(cursor_store));

    {
        let sub = bus.subscribe();
        let employees_projection = employees_projection.clone();
        let departments_projection = departments_projection.clone();
        let positions_projection = positions_projection.clone();
        let grades_projection = grades_projection.clone();
        let loans_projection = loans_projection.clone();
        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(env) => {
                        let apply_ok = match env.aggregate_type() {
                            "people.employee" => employees_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            "org.department" => departments_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            "org.position" => positions_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            "org.grade" => grades_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            "loans.application" => loans_projection
                                .apply_envelope(&env)
                                .map_err(|e| e.to_string()),
                            _ => Ok(()),
                        };

                        if let Err(e) = apply_ok {
                            tracing::warn!("projection apply failed: {e}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });
    }

    let dispatcher: Arc<PersistentDispatcher> =
        Arc::new(CommandDispatcher::new(store, bus));
    AppServices::Persistent {
        dispatcher,
        employees_projection,
        departments_projection,
        positions_projection,
        grades_projection,
        loans_projection,
    }
}

impl AppServices {
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: hrims_core::Aggregate<Error = DomainError>,
        A::Event: hrims_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        match self {
            AppServices::InMemory { dispatcher, .. } => dispatcher.dispatch::<A>(
                tenant_id,
                aggregate_id,
                aggregate_type,
                command,
                make_aggregate,
            ),
            AppServices::Persistent { dispatcher, .. } => dispatcher.dispatch::<A>(
                tenant_id,
                aggregate_id,
                aggregate_type,
                command,
                make_aggregate,
            ),
        }
    }

    pub fn employees_get(
        &self,
        tenant_id: TenantId,
        employee_id: &EmployeeId,
    ) -> Option<EmployeeReadModel> {
        match self {
            AppServices::InMemory { employees_projection, .. } => {
                employees_projection.get(tenant_id, employee_id)
            }
            AppServices::Persistent { employees_projection, .. } => {
                employees_projection.get(tenant_id, employee_id)
            }
        }
    }

    pub fn employees_list(&self, tenant_id: TenantId) -> Vec<EmployeeReadModel> {
        match self {
            AppServices::InMemory { employees_projection, .. } => {
                employees_projection.list(tenant_id)
            }
            AppServices::Persistent { employees_projection, .. } => {
                employees_projection.list(tenant_id)
            }
        }
    }

    pub fn employees_search(&self, tenant_id: TenantId, query: &str) -> Vec<EmployeeReadModel> {
        match self {
            AppServices::InMemory { employees_projection, .. } => {
                employees_projection.search_by_name(tenant_id, query)
            }
            AppServices::Persistent { employees_projection, .. } => {
                employees_projection.search_by_name(tenant_id, query)
            }
        }
    }

    pub fn employees_onboarding(
        &self,
        tenant_id: TenantId,
        employee_id: &EmployeeId,
    ) -> Option<OnboardingReadModel> {
        match self {
            AppServices::InMemory { employees_projection, .. } => {
                employees_projection.onboarding(tenant_id, employee_id)
            }
            AppServices::Persistent { employees_projection, .. } => {
                employees_projection.onboarding(tenant_id, employee_id)
            }
        }
    }

    pub fn departments_get(
        &self,
        tenant_id: TenantId,
        department_id: &DepartmentId,
    ) -> Option<DepartmentReadModel> {
        match self {
            AppServices::InMemory { departments_projection, .. } => {
                departments_projection.get(tenant_id, department_id)
            }
            AppServices::Persistent { departments_projection, .. } => {
                departments_projection.get(tenant_id, department_id)
            }
        }
    }

    pub fn departments_list(&self, tenant_id: TenantId) -> Vec<DepartmentReadModel> {
        match self {
            AppServices::InMemory { departments_projection, .. } => {
                departments_projection.list(tenant_id)
            }
            AppServices::Persistent { departments_projection, .. } => {
                departments_projection.list(tenant_id)
            }
        }
    }

    pub fn departments_search(&self, tenant_id: TenantId, query: &str) -> Vec<DepartmentReadModel> {
        match self {
            AppServices::InMemory { departments_projection, .. } => {
                departments_projection.search_by_name(tenant_id, query)
            }
            AppServices::Persistent { departments_projection, .. } => {
                departments_projection.search_by_name(tenant_id, query)
            }
        }
    }

    pub fn departments_would_create_cycle(
        &self,
        tenant_id: TenantId,
        department_id: DepartmentId,
        proposed_parent: DepartmentId,
    ) -> bool {
        match self {
            AppServices::InMemory { departments_projection, .. } => {
                departments_projection.would_create_cycle(tenant_id, department_id, proposed_parent)
            }
            AppServices::Persistent { departments_projection, .. } => {
                departments_projection.would_create_cycle(tenant_id, department_id, proposed_parent)
            }
        }
    }

    pub fn positions_get(
        &self,
        tenant_id: TenantId,
        position_id: &PositionId,
    ) -> Option<PositionReadModel> {
        match self {
            AppServices::InMemory { positions_projection, .. } => {
                positions_projection.get(tenant_id, position_id)
            }
            AppServices::Persistent { positions_projection, .. } => {
                positions_projection.get(tenant_id, position_id)
            }
        }
    }

    pub fn positions_list(&self, tenant_id: TenantId) -> Vec<PositionReadModel> {
        match self {
            AppServices::InMemory { positions_projection, .. } => {
                positions_projection.list(tenant_id)
            }
            AppServices::Persistent { positions_projection, .. } => {
                positions_projection.list(tenant_id)
            }
        }
    }

    pub fn positions_search(&self, tenant_id: TenantId, query: &str) -> Vec<PositionReadModel> {
        match self {
            AppServices::InMemory { positions_projection, .. } => {
                positions_projection.search_by_name(tenant_id, query)
            }
            AppServices::Persistent { positions_projection, .. } => {
                positions_projection.search_by_name(tenant_id, query)
            }
        }
    }

    pub fn grades_get(&self, tenant_id: TenantId, grade_id: &GradeId) -> Option<GradeReadModel> {
        match self {
            AppServices::InMemory { grades_projection, .. } => {
                grades_projection.get(tenant_id, grade_id)
            }
            AppServices::Persistent { grades_projection, .. } => {
                grades_projection.get(tenant_id, grade_id)
            }
        }
    }

    pub fn grades_list(&self, tenant_id: TenantId) -> Vec<GradeReadModel> {
        match self {
            AppServices::InMemory { grades_projection, .. } => grades_projection.list(tenant_id),
            AppServices::Persistent { grades_projection, .. } => grades_projection.list(tenant_id),
        }
    }

    pub fn grades_search(&self, tenant_id: TenantId, query: &str) -> Vec<GradeReadModel> {
        match self {
            AppServices::InMemory { grades_projection, .. } => {
                grades_projection.search_by_name(tenant_id, query)
            }
            AppServices::Persistent { grades_projection, .. } => {
                grades_projection.search_by_name(tenant_id, query)
            }
        }
    }

    pub fn loans_get(
        &self,
        tenant_id: TenantId,
        application_id: &LoanApplicationId,
    ) -> Option<LoanReadModel> {
        match self {
            AppServices::InMemory { loans_projection, .. } => {
                loans_projection.get(tenant_id, application_id)
            }
            AppServices::Persistent { loans_projection, .. } => {
                loans_projection.get(tenant_id, application_id)
            }
        }
    }

    pub fn loans_list(&self, tenant_id: TenantId) -> Vec<LoanReadModel> {
        match self {
            AppServices::InMemory { loans_projection, .. } => loans_projection.list(tenant_id),
            AppServices::Persistent { loans_projection, .. } => loans_projection.list(tenant_id),
        }
    }

    pub fn loans_search(&self, tenant_id: TenantId, query: &str) -> Vec<LoanReadModel> {
        match self {
            AppServices::InMemory { loans_projection, .. } => {
                loans_projection.search_by_name(tenant_id, query)
            }
            AppServices::Persistent { loans_projection, .. } => {
                loans_projection.search_by_name(tenant_id, query)
            }
        }
    }

    pub fn loans_list_for_employee(
        &self,
        tenant_id: TenantId,
        employee_id: AggregateId,
    ) -> Vec<LoanReadModel> {
        match self {
            AppServices::InMemory { loans_projection, .. } => {
                loans_projection.list_for_employee(tenant_id, employee_id)
            }
            AppServices::Persistent { loans_projection, .. } => {
                loans_projection.list_for_employee(tenant_id, employee_id)
            }
        }
    }
}
