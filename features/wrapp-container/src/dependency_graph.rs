use std::collections::HashSet;

use indexmap::IndexMap;

use crate::{
    container::Container,
    errors::CircularDependencyError,
    factories::{Dependency, FactoryKind, FactoryRecord, Producer},
    types::Key,
};

/// Own records of one container
type Scope = IndexMap<Key, std::sync::Arc<FactoryRecord>>;

/// Checks registering `record` under `key` keeps the graph of `container` acyclic
///
/// Keys are looked up the way they resolve: from the container which owns the
/// depending record upwards. Resolver and inline dependencies are opaque and end a branch.
pub(crate) fn check_registration(
    container: &Container,
    key: &Key,
    record: &FactoryRecord,
    replace: bool,
) -> Result<(), CircularDependencyError> {
    let scopes: Vec<Scope> = container
        .ancestry()
        .iter()
        .map(Container::own_factories)
        .collect();
    let mut walk = Walk {
        scopes: &scopes,
        candidate: Some((key, record)),
        checked: HashSet::new(),
    };

    let mut dependency_chain = Vec::new();
    match replace {
        // Replacing may depend on the key itself, so the walk starts below it
        true => walk.visit_all(0, edges(record), &mut dependency_chain),
        false => walk.visit(0, key, &mut dependency_chain),
    }
}

/// Checks a flattened set of records
pub(crate) fn check_flattened(records: &Scope) -> Result<(), CircularDependencyError> {
    let mut walk = Walk {
        scopes: std::slice::from_ref(records),
        candidate: None,
        checked: HashSet::new(),
    };

    for key in records.keys() {
        walk.visit(0, key, &mut Vec::new())?;
    }
    Ok(())
}

/// Keys a record resolves while producing its value
fn edges(record: &FactoryRecord) -> Vec<Key> {
    let mut edges: Vec<Key> = record
        .dependencies
        .iter()
        .filter_map(Dependency::key)
        .cloned()
        .collect();
    if let Producer::Alias(target) = &record.producer {
        edges.push(target.clone());
    }
    edges
}

struct Walk<'a> {
    scopes: &'a [Scope],
    candidate: Option<(&'a Key, &'a FactoryRecord)>,
    checked: HashSet<(usize, Key)>,
}

impl Walk<'_> {
    fn is_candidate(&self, scope: usize, key: &Key) -> bool {
        scope == 0 && self.candidate.is_some_and(|(candidate, _)| candidate == key)
    }

    /// Scope owning the record `key` resolves to, when asked from `scope`
    fn find(&self, scope: usize, key: &Key) -> Option<usize> {
        if self.is_candidate(scope, key) {
            return Some(scope);
        }
        (scope..self.scopes.len()).find(|index| self.scopes[*index].contains_key(key))
    }

    fn edges_of(&self, scope: usize, key: &Key) -> Vec<Key> {
        match self.candidate {
            Some((_, record)) if self.is_candidate(scope, key) => edges(record),
            _ => self.scopes[scope]
                .get(key)
                .map(|record| edges(record))
                .unwrap_or_default(),
        }
    }

    fn visit(
        &mut self,
        scope: usize,
        key: &Key,
        dependency_chain: &mut Vec<(usize, Key)>,
    ) -> Result<(), CircularDependencyError> {
        let node = (scope, key.clone());
        if dependency_chain.contains(&node) {
            let mut chain: Vec<Key> = dependency_chain.iter().map(|(_, key)| key.clone()).collect();
            chain.push(key.clone()); // Add current so chain is complete
            return Err(CircularDependencyError { chain });
        }

        // Already known to be acyclic
        if self.checked.contains(&node) {
            return Ok(());
        }

        dependency_chain.push(node.clone());
        let edges = self.edges_of(scope, key);
        self.visit_all(scope, edges, dependency_chain)?;
        dependency_chain.pop();

        self.checked.insert(node);
        Ok(())
    }

    fn visit_all(
        &mut self,
        scope: usize,
        dependencies: Vec<Key>,
        dependency_chain: &mut Vec<(usize, Key)>,
    ) -> Result<(), CircularDependencyError> {
        for dependency in dependencies {
            // Unknown keys fail at resolution, not here
            let Some(dependency_scope) = self.find(scope, &dependency) else {
                continue;
            };
            self.visit(dependency_scope, &dependency, dependency_chain)?;
        }
        Ok(())
    }
}

/// A service and the keys it depends on
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceNode {
    pub key: Key,
    /// `None` if no container in the chain registers the key
    pub kind: Option<FactoryKind>,
    /// Kind of the record a pass-through forwards to
    pub linked_kind: Option<FactoryKind>,
    /// Longest distance from one of the own keys of the container
    pub depth: usize,
    pub dependencies: Vec<Key>,
}

impl ServiceNode {
    /// Kind as shown in graphs, e.g. `namespace-pass-through` followed by the linked kind
    pub fn kind_label(&self) -> String {
        let kind = self.kind.map(|kind| kind.name()).unwrap_or_default();
        let linked = self.linked_kind.map(|kind| kind.name()).unwrap_or_default();
        format!("{kind}{linked}")
    }
}

/// Introspection view of a container's services
#[derive(Debug, Clone, Default)]
pub struct ServicesGraph {
    nodes: IndexMap<Key, ServiceNode>,
}

impl ServicesGraph {
    pub fn get(&self, key: impl Into<Key>) -> Option<&ServiceNode> {
        self.nodes.get(&key.into())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ServiceNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn visit(&mut self, container: &Container, key: &Key, depth: usize, path: &mut Vec<Key>) {
        if path.contains(key) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(key) {
            if node.depth >= depth {
                return;
            }
            node.depth = depth;
        }

        let record = container.factory(key);
        let link = record.as_ref().and_then(|record| record.link()).cloned();
        let linked = link
            .as_ref()
            .and_then(|link| link.target.factory(&link.target_key));

        // Dependencies of a pass-through are those of the record it forwards to
        let (source, described) = match (&link, &linked) {
            (Some(link), Some(linked)) => (&link.target, Some(linked)),
            _ => (container, record.as_ref()),
        };
        let dependencies = described.map(|record| edges(record)).unwrap_or_default();

        self.nodes
            .entry(key.clone())
            .and_modify(|node| node.depth = depth)
            .or_insert_with(|| ServiceNode {
                key: key.clone(),
                kind: record.as_ref().map(|record| record.kind),
                linked_kind: linked.as_ref().map(|record| record.kind),
                depth,
                dependencies: dependencies.clone(),
            });

        path.push(key.clone());
        for dependency in &dependencies {
            self.visit(source, dependency, depth + 1, path);
        }
        path.pop();
    }
}

impl Container {
    /// Every own key with its kind and dependencies, walked recursively
    pub fn services_graph(&self) -> ServicesGraph {
        let mut graph = ServicesGraph::default();
        for key in self.keys() {
            graph.visit(self, &key, 0, &mut Vec::new());
        }
        graph
    }
}
