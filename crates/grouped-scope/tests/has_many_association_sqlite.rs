use std::sync::Arc;

use grouped_scope::prelude::*;
use grouped_scope_sqlite::SqliteConnection;

#[derive(Debug, Clone, PartialEq)]
struct Employee {
    id: Option<i64>,
    name: String,
    group_id: Option<i64>,
}

impl Model for Employee {
    const TABLE_NAME: &'static str = "employees";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("name", self.name.clone().into()),
            ("group_id", self.group_id.into()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
            group_id: row.get_named("group_id")?,
        })
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![self.id.into()]
    }

    fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Report {
    id: Option<i64>,
    employee_id: i64,
    title: String,
    body: String,
}

impl Model for Report {
    const TABLE_NAME: &'static str = "reports";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("employee_id", self.employee_id.into()),
            ("title", self.title.clone().into()),
            ("body", self.body.clone().into()),
        ]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            employee_id: row.get_named("employee_id")?,
            title: row.get_named("title")?,
            body: row.get_named("body")?,
        })
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![self.id.into()]
    }

    fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

/// A group record whose members are the employees carrying its id.
#[derive(Debug, Clone, PartialEq)]
struct Team {
    id: Option<i64>,
    name: String,
}

impl Model for Team {
    const TABLE_NAME: &'static str = "teams";
    const PRIMARY_KEY: &'static [&'static str] = &["id"];

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![("id", self.id.into()), ("name", self.name.clone().into())]
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
        })
    }

    fn primary_key_value(&self) -> Vec<Value> {
        vec![self.id.into()]
    }

    fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

fn employee(id: i64, group_id: Option<i64>) -> Employee {
    Employee {
        id: Some(id),
        name: format!("employee {id}"),
        group_id,
    }
}

fn report(employee_id: i64, title: &str, body: &str) -> Report {
    Report {
        id: None,
        employee_id,
        title: title.to_string(),
        body: body.to_string(),
    }
}

fn team(id: i64) -> Team {
    Team {
        id: Some(id),
        name: format!("team {id}"),
    }
}

/// E1 (10) and 11 share group 1; E2 (99) has no group.
/// T1 belongs to 10, T2 to 11, T3 to 99.
fn setup() -> Arc<SqliteConnection> {
    let conn = SqliteConnection::open_memory().expect("open sqlite memory db");
    conn.execute_raw(
        "CREATE TABLE employees (id INTEGER PRIMARY KEY, name TEXT NOT NULL, group_id INTEGER);
         CREATE TABLE teams (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE reports (
             id INTEGER PRIMARY KEY,
             employee_id INTEGER NOT NULL,
             title TEXT NOT NULL,
             body TEXT NOT NULL
         );",
    )
    .expect("create schema");

    for e in [employee(10, Some(1)), employee(11, Some(1)), employee(99, None)] {
        insert!(&e).execute(&conn).expect("insert employee");
    }
    for t in [team(1), team(2)] {
        insert!(&t).execute(&conn).expect("insert team");
    }
    for r in [
        report(10, "URGENT", "quarterly numbers"),
        report(11, "status", "URGENT: server down"),
        report(99, "misc", "nothing to see"),
    ] {
        insert!(&r).execute(&conn).expect("insert report");
    }
    Arc::new(conn)
}

fn reports() -> Reflection<Employee, Report> {
    Reflection::has_many("reports", "employee_id")
        .extend("urgent", |q| q.filter(Expr::qualified("reports", "title").eq("URGENT")))
}

fn group_reports(conn: &Arc<SqliteConnection>) -> Arc<Reflection<Employee, Report>> {
    Arc::new(reports().to_grouped(GroupAccessor::siblings("group_id", Arc::clone(conn))))
}

fn with_urgent_title(q: Select<Report>) -> Select<Report> {
    q.filter(Expr::qualified("reports", "title").eq("URGENT"))
}

fn with_urgent_body(q: Select<Report>) -> Select<Report> {
    q.filter(Expr::col("body").like("%URGENT%"))
}

fn owner_ids(records: &[Report]) -> Vec<i64> {
    let mut ids: Vec<_> = records.iter().map(|r| r.employee_id).collect();
    ids.sort_unstable();
    ids
}

#[test]
fn ungrouped_scope_is_owner_only() {
    let conn = setup();
    let association = Association::new(employee(10, Some(1)), Arc::new(reports()));

    assert_eq!(
        association.query().unwrap().to_sql(),
        "SELECT * FROM reports WHERE \"reports\".\"employee_id\" = 10"
    );
    assert_eq!(owner_ids(association.load(conn.as_ref()).unwrap()), vec![10]);
    assert_eq!(association.count(conn.as_ref()).unwrap(), 1);
}

#[test]
fn grouped_scope_covers_group_members() {
    let conn = setup();
    let association = Association::new(employee(10, Some(1)), group_reports(&conn));

    assert_eq!(
        association.query().unwrap().to_sql(),
        "SELECT * FROM reports WHERE \"reports\".\"employee_id\" IN (10, 11)"
    );
    assert_eq!(
        owner_ids(association.load(conn.as_ref()).unwrap()),
        vec![10, 11]
    );
    assert_eq!(association.count(conn.as_ref()).unwrap(), 2);
}

#[test]
fn ungrouped_owner_is_a_group_of_one() {
    let conn = setup();
    let association = Association::new(employee(99, None), group_reports(&conn));

    assert_eq!(
        association.query().unwrap().to_sql(),
        "SELECT * FROM reports WHERE \"reports\".\"employee_id\" IN (99)"
    );
    assert_eq!(owner_ids(association.load(conn.as_ref()).unwrap()), vec![99]);
}

#[test]
fn team_owner_resolves_through_its_members() {
    let conn = setup();
    let team_reports = Arc::new(
        Reflection::<Team, Report, Employee>::has_many("reports", "employee_id")
            .grouped_by(GroupAccessor::members("group_id", Arc::clone(&conn))),
    );

    let association = Association::new(team(1), Arc::clone(&team_reports));
    assert_eq!(
        owner_ids(association.load(conn.as_ref()).unwrap()),
        vec![10, 11]
    );
    assert_eq!(association.count(conn.as_ref()).unwrap(), 2);
}

#[test]
fn empty_group_matches_nothing() {
    let conn = setup();
    let team_reports = Arc::new(
        Reflection::<Team, Report, Employee>::has_many("reports", "employee_id")
            .grouped_by(GroupAccessor::members("group_id", Arc::clone(&conn))),
    );

    let association = Association::new(team(2), team_reports);
    let scope = association.query().unwrap();
    assert_eq!(scope.to_sql(), "SELECT * FROM reports WHERE 1 = 0");
    assert_eq!(scope.count(conn.as_ref()).unwrap(), 0);
    assert!(scope.all(conn.as_ref()).unwrap().is_empty());
    assert!(association.load(conn.as_ref()).unwrap().is_empty());
    assert_eq!(select!(Report).count(conn.as_ref()).unwrap(), 3);
}

#[test]
fn group_count_equals_sum_of_member_counts() {
    let conn = setup();
    let e1 = employee(10, Some(1));
    let e2 = employee(11, Some(1));
    let own = Arc::new(reports());

    let e1_count = Association::new(e1.clone(), Arc::clone(&own))
        .count(conn.as_ref())
        .unwrap();
    let e2_count = Association::new(e2.clone(), own)
        .count(conn.as_ref())
        .unwrap();
    let group_count = Association::new(e2, group_reports(&conn))
        .count(conn.as_ref())
        .unwrap();

    assert_eq!(e1_count + e2_count, group_count);
    assert_eq!(
        association_count_sql(&e1, &group_reports(&conn)),
        "SELECT COUNT(*) as count FROM reports WHERE \"reports\".\"employee_id\" IN (10, 11)"
    );
}

fn association_count_sql(
    owner: &Employee,
    reflection: &Arc<Reflection<Employee, Report>>,
) -> String {
    Association::new(owner.clone(), Arc::clone(reflection))
        .scope()
        .unwrap()
        .count_sql()
}

#[test]
fn extension_applies_on_top_of_group_scope() {
    let conn = setup();
    let own = Association::new(employee(10, Some(1)), Arc::new(reports()));
    let grouped = Association::new(employee(11, Some(1)), group_reports(&conn));

    let own_urgent = own.extension("urgent").unwrap().all(conn.as_ref()).unwrap();
    let group_urgent = grouped.extension("urgent").unwrap();
    assert_eq!(
        group_urgent.to_sql(),
        "SELECT * FROM reports WHERE \"reports\".\"employee_id\" IN (10, 11) \
         AND \"reports\".\"title\" = 'URGENT'"
    );
    assert_eq!(group_urgent.all(conn.as_ref()).unwrap(), own_urgent);
    assert_eq!(own_urgent.len(), 1);
}

#[test]
fn named_scopes_chain_onto_group_scope() {
    let conn = setup();
    let grouped = Association::new(employee(11, Some(1)), group_reports(&conn));

    let titles = grouped
        .query()
        .unwrap()
        .apply(with_urgent_title)
        .all(conn.as_ref())
        .unwrap();
    assert_eq!(owner_ids(&titles), vec![10]);

    let bodies = grouped
        .query()
        .unwrap()
        .apply(with_urgent_body)
        .all(conn.as_ref())
        .unwrap();
    assert_eq!(owner_ids(&bodies), vec![11]);

    let both = grouped
        .query()
        .unwrap()
        .apply(with_urgent_title)
        .apply(with_urgent_body);
    let sql = both.to_sql();
    assert!(sql.starts_with("SELECT * FROM reports WHERE"));
    assert!(sql.contains("\"reports\".\"employee_id\" IN (10, 11)"));
    assert!(sql.contains("\"reports\".\"title\" = 'URGENT'"));
    assert!(sql.contains("\"body\" LIKE '%URGENT%'"));
    assert!(both.all(conn.as_ref()).unwrap().is_empty());
}

#[test]
fn pagination_follows_scope_and_filters() {
    let conn = setup();
    let grouped = Association::new(employee(11, Some(1)), group_reports(&conn));

    let paged = grouped
        .query()
        .unwrap()
        .apply(with_urgent_title)
        .apply(with_urgent_body)
        .paginate(1, 2);
    assert!(paged.to_sql().ends_with("LIMIT 2 OFFSET 0"));
    assert!(paged.to_sql().contains("WHERE \"reports\".\"employee_id\" IN (10, 11)"));

    let page = grouped.page(conn.as_ref(), 2, 1).unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_pages(), 2);
    assert!(!page.has_next());
}

#[test]
fn or_filter_does_not_leak_outside_group() {
    let conn = setup();
    let grouped = Association::new(employee(10, Some(1)), group_reports(&conn));

    let widened = grouped
        .query()
        .unwrap()
        .filter(Expr::col("title").eq("misc"))
        .or_filter(Expr::col("title").eq("status"))
        .all(conn.as_ref())
        .unwrap();
    assert_eq!(owner_ids(&widened), vec![11]);
}

#[test]
fn filters_compose_the_same_with_or_without_grouping() {
    let conn = setup();
    let own = Association::new(employee(10, Some(1)), Arc::new(reports()));
    let grouped = Association::new(employee(10, Some(1)), group_reports(&conn));

    let own_q = own.query().unwrap().apply(with_urgent_body);
    let grouped_q = grouped.query().unwrap().apply(with_urgent_body);
    assert_eq!(own_q.where_expr(), grouped_q.where_expr());
    assert_ne!(own_q.scope_expr(), grouped_q.scope_expr());
}

#[test]
fn memoized_scope_does_not_drift_until_reload() {
    let conn = setup();
    let mut association = Association::new(employee(10, Some(1)), group_reports(&conn));

    let first: *const Select<Report> = association.scope().unwrap();
    assert_eq!(association.load(conn.as_ref()).unwrap().len(), 2);

    insert!(&employee(12, Some(1)))
        .execute(conn.as_ref())
        .unwrap();
    insert!(&report(12, "late", "URGENT"))
        .execute(conn.as_ref())
        .unwrap();

    let second: *const Select<Report> = association.scope().unwrap();
    assert!(std::ptr::eq(first, second));
    assert_eq!(association.count(conn.as_ref()).unwrap(), 2);
    assert_eq!(association.load(conn.as_ref()).unwrap().len(), 2);

    let reloaded = association.reloaded(conn.as_ref()).unwrap();
    assert_eq!(owner_ids(reloaded), vec![10, 11, 12]);
    assert!(association.query().unwrap().to_sql().ends_with("IN (10, 11, 12)"));
}

#[test]
fn grouped_reflection_without_accessor_is_a_configuration_error() {
    let conn = setup();
    let association = Association::new(employee(10, Some(1)), Arc::new(reports().grouped()));

    match association.load(conn.as_ref()) {
        Err(Error::Config(err)) => assert_eq!(err.kind, ConfigErrorKind::MissingGroupAccessor),
        other => panic!("expected configuration error, got {other:?}"),
    }
    assert!(!association.is_resolved());
}

#[test]
fn malformed_foreign_key_is_a_configuration_error() {
    let conn = setup();
    let reflection = Arc::new(Reflection::<Employee, Report>::has_many(
        "reports",
        "employee_id; DROP TABLE reports",
    ));
    let association = Association::new(employee(10, Some(1)), reflection);

    let err = association.count(conn.as_ref()).unwrap_err();
    assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidReflection));
    assert_eq!(select!(Report).count(conn.as_ref()).unwrap(), 3);
}
