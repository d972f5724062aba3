//! Compilation tests for the qb module.

use crate::qb::{Direction, JoinType, Query};
use crate::value::SqlValue;

fn placeholder_count(text: &str) -> usize {
    let bytes = text.as_bytes();
    (0..bytes.len())
        .filter(|&i| bytes[i] == b'$' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
        .count()
}

#[test]
fn test_select_star_default() {
    let stmt = Query::new("all").select(&[]).from("t").build().unwrap();
    assert_eq!(stmt.text, "SELECT * FROM t;");
    assert!(stmt.values.is_empty());
}

#[test]
fn test_select_full_clause_order() {
    let stmt = Query::new("report")
        .select(&["u.id", "count(o.id) AS orders"])
        .from("users u")
        .left_join("orders o", "o.user_id = u.id")
        .where_("u.status = :status")
        .and("u.age > :age")
        .group_by(&["u.id"])
        .having("count(o.id) > :min")
        .order_by("orders", Direction::Desc)
        .order_by("u.id", Direction::Asc)
        .limit(10)
        .offset(20)
        .set_param("status", "active")
        .set_param("age", 18)
        .set_param("min", 2)
        .build()
        .unwrap();

    assert_eq!(
        stmt.text,
        "SELECT u.id, count(o.id) AS orders FROM users u LEFT JOIN orders o ON o.user_id = u.id \
         WHERE u.status = $1 AND (u.age > $2) GROUP BY u.id HAVING count(o.id) > $3 \
         ORDER BY orders DESC, u.id ASC LIMIT 10 OFFSET 20;"
    );
    assert_eq!(
        stmt.values,
        vec![SqlValue::from("active"), SqlValue::Int(18), SqlValue::Int(2)]
    );
}

#[test]
fn test_where_replaces_and_or_append() {
    let stmt = Query::new("q")
        .select(&["*"])
        .from("t")
        .where_("a = 1")
        .where_("b = 2")
        .or("c = 3")
        .and("d = 4")
        .build()
        .unwrap();
    assert_eq!(stmt.text, "SELECT * FROM t WHERE b = 2 OR c = 3 AND (d = 4);");
}

#[test]
fn test_and_without_where_starts_predicate() {
    let stmt = Query::new("q").select(&[]).from("t").and("a = 1").build().unwrap();
    assert_eq!(stmt.text, "SELECT * FROM t WHERE a = 1;");
}

#[test]
fn test_cross_join_has_no_on() {
    let stmt = Query::new("q")
        .select(&[])
        .from("a")
        .join(JoinType::Cross, "b", "")
        .join(JoinType::FullOuter, "c", "c.id = a.id")
        .build()
        .unwrap();
    assert_eq!(stmt.text, "SELECT * FROM a CROSS JOIN b FULL OUTER JOIN c ON c.id = a.id;");
}

#[test]
fn test_join_keywords() {
    let stmt = Query::new("q")
        .select(&[])
        .from("a")
        .join(JoinType::Natural, "b", "")
        .join(JoinType::NaturalOuter, "c", "")
        .join(JoinType::LeftOuter, "d", "d.id = a.id")
        .build()
        .unwrap();
    assert_eq!(
        stmt.text,
        "SELECT * FROM a NATURAL JOIN b NATURAL OUTER JOIN c LEFT OUTER JOIN d ON d.id = a.id;"
    );
}

#[test]
fn test_insert_single_row() {
    let stmt = Query::new("createUser")
        .insert("public.user_mst")
        .insert_fields(&["name", "email"])
        .insert_values(["alice", "alice@example.com"])
        .returning(&[])
        .build()
        .unwrap();
    assert_eq!(
        stmt.text,
        "INSERT INTO public.user_mst (name, email) VALUES ($1,$2) RETURNING *;"
    );
    assert_eq!(
        stmt.values,
        vec![SqlValue::from("alice"), SqlValue::from("alice@example.com")]
    );
}

#[test]
fn test_insert_multi_row_flattens() {
    let stmt = Query::new("batch")
        .insert("t")
        .insert_fields(&["a", "b"])
        .insert_rows([[1, 2], [3, 4]])
        .build()
        .unwrap();
    assert!(stmt.text.contains("VALUES ($1,$2),($3,$4)"));
    assert_eq!(
        stmt.values,
        vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3), SqlValue::Int(4)]
    );
}

#[test]
fn test_insert_row_width_mismatch_is_config_error() {
    let err = Query::new("bad")
        .insert("t")
        .insert_fields(&["a", "b"])
        .insert_rows(vec![vec![1, 2], vec![3]])
        .build()
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_insert_without_fields_is_config_error() {
    let err = Query::new("bad")
        .insert("t")
        .insert_values([1])
        .build()
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_insert_without_values_is_config_error() {
    let err = Query::new("bad")
        .insert("t")
        .insert_fields(&["a"])
        .build()
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_update_binds_sets_before_named_params() {
    let stmt = Query::new("updateUser")
        .update("public.user_mst")
        .set("name", "bob")
        .set_raw("updated_at", "now()")
        .set("email", "bob@example.com")
        .where_("index = :index")
        .set_param("index", 7)
        .returning(&["index"])
        .build()
        .unwrap();
    assert_eq!(
        stmt.text,
        "UPDATE public.user_mst SET name = $1, updated_at = now(), email = $2 \
         WHERE index = $3 RETURNING index;"
    );
    assert_eq!(
        stmt.values,
        vec![
            SqlValue::from("bob"),
            SqlValue::from("bob@example.com"),
            SqlValue::Int(7)
        ]
    );
}

#[test]
fn test_update_from_struct_snake_cases_keys() {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Patch {
        display_name: String,
        login_count: i32,
    }

    let stmt = Query::new("patch")
        .update("users")
        .update_from(&Patch {
            display_name: "n".into(),
            login_count: 3,
        })
        .unwrap()
        .where_("id = :id")
        .set_param("id", 1)
        .build()
        .unwrap();
    assert_eq!(
        stmt.text,
        "UPDATE users SET display_name = $1, login_count = $2 WHERE id = $3;"
    );
}

#[test]
fn test_update_without_sets_is_config_error() {
    let err = Query::new("bad").update("t").where_("id = 1").build().unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_delete() {
    let stmt = Query::new("del")
        .delete("sessions")
        .where_("user_id = :uid")
        .set_param("uid", 3)
        .build()
        .unwrap();
    assert_eq!(stmt.text, "DELETE FROM sessions WHERE user_id = $1;");
    assert_eq!(stmt.values, vec![SqlValue::Int(3)]);
}

#[test]
fn test_missing_kind_is_config_error() {
    let err = Query::new("nothing").from("t").build().unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_missing_table_is_config_error() {
    let err = Query::new("nothing").select(&["1"]).build().unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_kind_last_write_wins() {
    let stmt = Query::new("q").select(&[]).delete("t").build().unwrap();
    assert_eq!(stmt.text, "DELETE FROM t;");
}

#[test]
fn test_placeholders_match_values() {
    let stmt = Query::new("q")
        .select(&[])
        .from("t")
        .where_("a = :a AND b = :bb AND c = :ccc AND a2 = :a")
        .set_param("a", 1)
        .set_param("bb", 2)
        .set_param("ccc", 3)
        .set_param("unused", 4)
        .build()
        .unwrap();
    let distinct: std::collections::BTreeSet<&str> = stmt
        .text
        .split(|c: char| !(c == '$' || c.is_ascii_digit()))
        .filter(|tok| tok.starts_with('$'))
        .collect();
    assert_eq!(distinct.len(), stmt.values.len());
    assert_eq!(placeholder_count(&stmt.text), 4);

    // substituting $i with values[i-1] reproduces the literal query
    let mut literal = stmt.text.clone();
    for (i, v) in stmt.values.iter().enumerate().rev() {
        literal = literal.replace(&format!("${}", i + 1), &v.to_string());
    }
    assert_eq!(literal, "SELECT * FROM t WHERE a = 1 AND b = 2 AND c = 3 AND a2 = 1;");
}

#[test]
fn test_set_param_overwrites_and_set_params_replaces() {
    let q = Query::new("q")
        .select(&[])
        .from("t")
        .where_("a = :a")
        .set_param("a", 1)
        .set_param("a", 2);
    assert_eq!(q.build().unwrap().values, vec![SqlValue::Int(2)]);

    let q = q.set_params([("b", 5)]).where_("b = :b");
    let stmt = q.build().unwrap();
    assert_eq!(stmt.text, "SELECT * FROM t WHERE b = $1;");
    assert_eq!(stmt.values, vec![SqlValue::Int(5)]);
}

#[test]
fn test_raw_build() {
    let stmt = Query::new("checkEmailExist")
        .raw("SELECT exists(SELECT 1 FROM public.user_mst")
        .raw("WHERE email = :email)")
        .set_param("email", "a@b.c")
        .build_raw()
        .unwrap();
    assert_eq!(
        stmt.text,
        "SELECT exists(SELECT 1 FROM public.user_mst WHERE email = $1)"
    );
    assert_eq!(stmt.name, "checkEmailExist");
    assert_eq!(stmt.values, vec![SqlValue::from("a@b.c")]);
}

#[test]
fn test_raw_fragments_after_line_comment() {
    let stmt = Query::new("usersById")
        .raw("SELECT * FROM users -- the user's rows")
        .raw("WHERE id = :id")
        .set_param("id", 7_i64)
        .build_raw()
        .unwrap();
    assert_eq!(stmt.text, "SELECT * FROM users -- the user's rows\nWHERE id = $1");
    assert_eq!(stmt.values, vec![SqlValue::from(7_i64)]);

    let stmt = Query::new("padded")
        .raw("SELECT 1")
        .raw("   ")
        .raw("\n  FROM t")
        .build_raw()
        .unwrap();
    assert_eq!(stmt.text, "SELECT 1 \n  FROM t");
}

#[test]
fn test_raw_build_empty_is_config_error() {
    assert!(Query::new("empty").build_raw().unwrap_err().is_config());
}
