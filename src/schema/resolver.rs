use crate::core::{EntityTypeId, FixtureError, Result};
use super::SchemaModel;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// `child` holds a foreign key referencing `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub child: EntityTypeId,
    pub parent: EntityTypeId,
}

/// Computes a parents-before-children generation order from foreign key
/// metadata. Read-only; never consulted by `generate` itself.
pub struct DependencyResolver<'a> {
    schema: &'a dyn SchemaModel,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(schema: &'a dyn SchemaModel) -> Self {
        Self { schema }
    }

    /// Order every type of the schema; ties resolve in registration order.
    pub fn order_all(&self) -> Result<Vec<EntityTypeId>> {
        self.order(&self.schema.entity_types())
    }

    /// Order `entity_types` so that every parent precedes its children.
    /// Ties resolve in the order the types were given. Edges to parents
    /// outside the requested set are ignored.
    pub fn order(&self, entity_types: &[EntityTypeId]) -> Result<Vec<EntityTypeId>> {
        let positions = self.positions(entity_types)?;
        let edges = self.collect_edges(&positions)?;

        let mut indegree: HashMap<&EntityTypeId, usize> =
            positions.keys().map(|id| (*id, 0)).collect();
        let mut outgoing: HashMap<&EntityTypeId, Vec<&EntityTypeId>> = HashMap::new();

        for edge in &edges {
            if let Some(degree) = indegree.get_mut(&edge.child) {
                *degree += 1;
            }
            outgoing.entry(&edge.parent).or_default().push(&edge.child);
        }

        let mut ready = BinaryHeap::new();
        for (id, degree) in &indegree {
            if *degree == 0 {
                ready.push(Reverse((positions[id], *id)));
            }
        }

        let mut order = Vec::with_capacity(positions.len());
        while let Some(Reverse((_, current))) = ready.pop() {
            order.push(current.clone());

            if let Some(dependents) = outgoing.get(current) {
                for dependent in dependents {
                    let next_degree = indegree.get_mut(dependent).ok_or_else(|| {
                        FixtureError::SchemaError(format!(
                            "Internal resolver error: missing indegree for '{}'",
                            dependent
                        ))
                    })?;
                    *next_degree -= 1;
                    if *next_degree == 0 {
                        ready.push(Reverse((positions[dependent], *dependent)));
                    }
                }
            }
        }

        if order.len() != positions.len() {
            let mut unresolved = indegree
                .into_iter()
                .filter_map(|(id, degree)| (degree > 0).then(|| id.clone()))
                .collect::<Vec<_>>();
            unresolved.sort();
            return Err(FixtureError::CyclicDependency {
                entity_types: unresolved,
            });
        }

        Ok(order)
    }

    /// Dependency edges among `entity_types`, one per (child, parent) pair.
    pub fn edges(&self, entity_types: &[EntityTypeId]) -> Result<Vec<DependencyEdge>> {
        let positions = self.positions(entity_types)?;
        self.collect_edges(&positions)
    }

    fn positions<'t>(
        &self,
        entity_types: &'t [EntityTypeId],
    ) -> Result<HashMap<&'t EntityTypeId, usize>> {
        let mut positions = HashMap::with_capacity(entity_types.len());
        for id in entity_types {
            // Fail early on unknown types.
            self.schema.descriptor(id)?;
            let next = positions.len();
            positions.entry(id).or_insert(next);
        }
        Ok(positions)
    }

    fn collect_edges(&self, positions: &HashMap<&EntityTypeId, usize>) -> Result<Vec<DependencyEdge>> {
        let mut ordered: Vec<(&EntityTypeId, usize)> =
            positions.iter().map(|(id, pos)| (*id, *pos)).collect();
        ordered.sort_by_key(|(_, pos)| *pos);

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for (child, _) in ordered {
            for fk in self.schema.foreign_keys(child)? {
                if !positions.contains_key(&fk.references) {
                    continue;
                }
                let edge = DependencyEdge {
                    child: child.clone(),
                    parent: fk.references.clone(),
                };
                if seen.insert(edge.clone()) {
                    edges.push(edge);
                }
            }
        }
        Ok(edges)
    }
}
