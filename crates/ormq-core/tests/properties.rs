//! Property-based tests for filtering, ordering, paging and joins.

use ormq_core::config::ExecutorConfig;
use ormq_core::prelude::*;
use ormq_core::proto::{CompareOp, JoinSpec, QueryPlan, SelectItem};
use proptest::prelude::*;

/// (age, has username, team)
fn members_strategy(max_rows: usize) -> impl Strategy<Value = Vec<Member>> {
    prop::collection::vec((0i32..60, any::<bool>(), prop::option::of(1i64..=3)), 0..max_rows)
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (age, named, team))| {
                    let id = i as i64 + 1;
                    if named {
                        Member::new(id, format!("member{}", id), age, team)
                    } else {
                        Member::anonymous(id, age, team)
                    }
                })
                .collect()
        })
}

fn database(members: &[Member], config: ExecutorConfig) -> Database {
    let db = Database::new(model::catalog()).with_config(config);
    for (id, name) in [(1, "teamA"), (2, "teamB"), (3, "teamC")] {
        db.insert(&Team::new(id, name)).unwrap();
    }
    for member in members {
        db.insert(member).unwrap();
    }
    db
}

fn ids(members: &[Member]) -> Vec<i64> {
    members.iter().map(|m| m.id).collect()
}

proptest! {
    /// Property: between is inclusive on both ends.
    #[test]
    fn between_is_inclusive(
        members in members_strategy(40),
        a in 0i32..60,
        b in 0i32..60,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let db = database(&members, ExecutorConfig::default());
        let m = QMember::member();

        let query = QueryFactory::new()
            .select_from(&m)
            .where_(m.age.between(low, high))
            .build()
            .unwrap();
        let found = db.snapshot().executor().fetch(&query).unwrap();

        let expected: Vec<i64> = members
            .iter()
            .filter(|m| low <= m.age && m.age <= high)
            .map(|m| m.id)
            .collect();
        prop_assert_eq!(ids(&found), expected);
    }

    /// Property: a page holds max(0, min(limit, total - offset)) rows and
    /// the total ignores paging.
    #[test]
    fn page_sizes(
        members in members_strategy(40),
        offset in 0i64..50,
        limit in 1i64..20,
    ) {
        let db = database(&members, ExecutorConfig::default());
        let m = QMember::member();

        let query = QueryFactory::new()
            .select_from(&m)
            .order_by(m.age.asc())
            .offset(offset)
            .limit(limit)
            .build()
            .unwrap();
        let page = db.snapshot().executor().fetch_results(&query).unwrap();

        let n = members.len() as i64;
        let expected = limit.min(n - offset).max(0) as usize;
        prop_assert_eq!(page.total, members.len() as u64);
        prop_assert_eq!(page.results.len(), expected);
    }

    /// Property: sorting is stable; ties keep insertion order.
    #[test]
    fn sort_is_stable(members in members_strategy(40)) {
        let db = database(&members, ExecutorConfig::default());
        let m = QMember::member();

        let query = QueryFactory::new()
            .select_from(&m)
            .order_by(m.age.desc())
            .build()
            .unwrap();
        let sorted = db.snapshot().executor().fetch(&query).unwrap();

        let mut expected = members.clone();
        expected.sort_by(|a, b| b.age.cmp(&a.age));
        prop_assert_eq!(ids(&sorted), ids(&expected));
    }

    /// Property: nulls_last puts every null username after every named one.
    #[test]
    fn nulls_last_regardless_of_direction(members in members_strategy(30), desc in any::<bool>()) {
        let db = database(&members, ExecutorConfig::default());
        let m = QMember::member();

        let order = if desc { m.username.desc() } else { m.username.asc() };
        let query = QueryFactory::new()
            .select_from(&m)
            .order_by(order.nulls_last())
            .build()
            .unwrap();
        let sorted = db.snapshot().executor().fetch(&query).unwrap();

        let first_null = sorted.iter().position(|m| m.username.is_none()).unwrap_or(sorted.len());
        prop_assert!(sorted[first_null..].iter().all(|m| m.username.is_none()));
    }

    /// Property: a relation join equals the filtered cross product.
    #[test]
    fn join_equals_filtered_cross_product(members in members_strategy(30)) {
        let db = database(&members, ExecutorConfig::default());
        let snapshot = db.snapshot();
        let exec = snapshot.executor();

        let joined = QueryPlan::new()
            .with_select(SelectItem::Entity("m".into()))
            .with_select(SelectItem::Entity("t".into()))
            .with_source("Member", "m")
            .with_join(JoinSpec::new("m", "team", "t"));
        let crossed = QueryPlan::new()
            .with_select(SelectItem::Entity("m".into()))
            .with_select(SelectItem::Entity("t".into()))
            .with_source("Member", "m")
            .with_source("Team", "t")
            .with_filter(Expr::compare(
                CompareOp::Eq,
                Expr::field("m", "team"),
                Expr::field("t", "id"),
            ));

        let a = exec.execute(&joined).unwrap();
        let b = exec.execute(&crossed).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Property: hash and nested loop joins return identical rows.
    #[test]
    fn join_strategies_agree(members in members_strategy(40)) {
        let m = QMember::member();
        let t = QTeam::team();
        let query = QueryFactory::new()
            .select(vec![(&m).into(), (&t.name).into()])
            .from(&m)
            .join(&m.team, &t)
            .build()
            .unwrap();

        let hashed = database(&members, ExecutorConfig::new().with_hash_join_threshold(0));
        let nested = database(&members, ExecutorConfig::new().with_hash_join_threshold(usize::MAX));

        let a = hashed.snapshot().executor().fetch(&query).unwrap();
        let b = nested.snapshot().executor().fetch(&query).unwrap();
        prop_assert_eq!(a, b);
    }
}
