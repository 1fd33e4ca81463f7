#![allow(dead_code)]

use memofixture::schema::{Catalog, EntityDescriptor, FieldDef, ForeignKey};
use memofixture::{DataType, EntityTypeId, FixtureSession, KeyTuple, Result, SessionConfig, Value};

pub const TABLE1: &str = "Table1";
pub const TABLE2: &str = "Table2";
pub const TABLE3: &str = "Table3";
pub const TABLE4: &str = "Table4";

/// Table1 <- Table2 <- Table3 (composite) <- Table4 (composite, four parts).
pub fn catalog() -> Catalog {
    Catalog::from_descriptors([
        EntityDescriptor::new(TABLE1)
            .field(FieldDef::new("col1_pk", DataType::Integer).not_null())
            .field(FieldDef::new("col2", DataType::Text))
            .field(FieldDef::new("col3", DataType::Integer))
            .primary_key(["col1_pk"])
            .collection("table2s", TABLE2),
        EntityDescriptor::new(TABLE2)
            .field(FieldDef::new("col1_pk", DataType::Integer).not_null())
            .field(FieldDef::new("col2_fk", DataType::Integer).not_null())
            .primary_key(["col1_pk"])
            .foreign_key(ForeignKey::single("col2_fk", TABLE1))
            .reference("table1", TABLE1),
        EntityDescriptor::new(TABLE3)
            .field(FieldDef::new("col1_pkfk", DataType::Integer).not_null())
            .field(FieldDef::new("col2_fk", DataType::Integer).not_null())
            .field(FieldDef::new("value", DataType::Text))
            .primary_key(["col1_pkfk", "col2_fk"])
            .foreign_key(ForeignKey::single("col1_pkfk", TABLE1))
            .foreign_key(ForeignKey::single("col2_fk", TABLE2))
            .reference("table1", TABLE1)
            .reference("table2", TABLE2),
        EntityDescriptor::new(TABLE4)
            .field(FieldDef::new("col1_t1pkfk", DataType::Integer).not_null())
            .field(FieldDef::new("col2_t2pkfk", DataType::Integer).not_null())
            .field(FieldDef::new("col3_t3pkfk_pkfk", DataType::Integer).not_null())
            .field(FieldDef::new("col4_t3pkfk_fk", DataType::Integer).not_null())
            .field(FieldDef::new("col5_value", DataType::Text))
            .field(FieldDef::new("col6_extra", DataType::Integer))
            .primary_key(["col1_t1pkfk", "col2_t2pkfk", "col3_t3pkfk_pkfk", "col4_t3pkfk_fk"])
            .foreign_key(ForeignKey::single("col1_t1pkfk", TABLE1))
            .foreign_key(ForeignKey::single("col2_t2pkfk", TABLE2))
            .foreign_key(ForeignKey::new(["col3_t3pkfk_pkfk", "col4_t3pkfk_fk"], TABLE3))
            .reference("table3", TABLE3),
    ])
    .expect("fixture schema is valid")
}

pub fn register_rules(session: &mut FixtureSession) {
    session.register_key_assignment_rule(TABLE1, |row, keys| {
        row.set("col1_pk", keys.sequential_key(TABLE1));
        Ok(())
    });

    session.register_key_assignment_rule(TABLE2, |row, keys| {
        row.set("col1_pk", keys.sequential_key(TABLE2));
        let parent = keys.random_existing_key(TABLE1)?;
        row.set("col2_fk", parent.values()[0].clone());
        Ok(())
    });

    session.register_key_assignment_rule(TABLE3, |row, keys| {
        let candidates = keys.project(TABLE2, &["col2_fk", "col1_pk"])?;
        let key = keys.unique_random_key(TABLE3, &candidates)?;
        row.set("col1_pkfk", key.values()[0].clone());
        row.set("col2_fk", key.values()[1].clone());
        Ok(())
    });

    session.register_key_assignment_rule(TABLE4, |row, keys| {
        let candidates = keys.project(TABLE3, &["col1_pkfk", "col2_fk", "col1_pkfk", "col2_fk"])?;
        let key = keys.unique_random_key(TABLE4, &candidates)?;
        let fields = ["col1_t1pkfk", "col2_t2pkfk", "col3_t3pkfk_pkfk", "col4_t3pkfk_fk"];
        for (field, value) in fields.iter().zip(key.into_values()) {
            row.set(field, value);
        }
        Ok(())
    });
}

pub fn session() -> FixtureSession {
    session_with(SessionConfig::new().seed(2024))
}

pub fn session_with(config: SessionConfig) -> FixtureSession {
    let mut session = FixtureSession::with_config(catalog(), config).expect("valid config");
    register_rules(&mut session);
    session
}

pub fn count(session: &FixtureSession, entity_type: &str) -> usize {
    session
        .repository()
        .row_count(&EntityTypeId::from(entity_type))
        .expect("known entity type")
}

/// Table1 rows: `total`.
pub fn fill_table1(session: &mut FixtureSession, total: usize) -> Result<()> {
    let items = session.generate_many(TABLE1, total)?;
    assert_eq!(items.len(), total);
    Ok(())
}

/// Table1 rows: `2 * total`, Table2 rows: `total`.
pub fn fill_table2(session: &mut FixtureSession, total: usize) -> Result<()> {
    fill_table1(session, total * 2)?;
    let items = session.generate_many(TABLE2, total)?;
    assert_eq!(items.len(), total);
    assert_eq!(count(session, TABLE1), total * 2);
    Ok(())
}

pub fn fill_table3(session: &mut FixtureSession, total: usize) -> Result<()> {
    fill_table2(session, total * 2)?;
    let items = session.generate_many(TABLE3, total)?;
    assert_eq!(items.len(), total);
    assert_eq!(count(session, TABLE2), total * 2);
    assert_eq!(count(session, TABLE1), total * 4);
    Ok(())
}

pub fn fill_table4(session: &mut FixtureSession, total: usize) -> Result<()> {
    fill_table3(session, total * 2)?;
    let items = session.generate_many(TABLE4, total)?;
    assert_eq!(items.len(), total);
    assert_eq!(count(session, TABLE3), total * 2);
    assert_eq!(count(session, TABLE2), total * 4);
    assert_eq!(count(session, TABLE1), total * 8);
    Ok(())
}

pub fn key(values: &[i64]) -> KeyTuple {
    KeyTuple::new(values.iter().map(|v| Value::Integer(*v)).collect())
}
