//! Dependency graph over component back-references.
//!
//! The graph is resolved once, before any transaction is sent, into a list of
//! waves. Every component of a wave only depends on components of earlier
//! waves, so the members of a wave can be deployed concurrently.

use std::collections::{HashMap, HashSet};

use crate::plan::DeploymentPlan;

/// Errors raised while validating or resolving a deployment plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("deployment plan has no components")]
    Empty,
    #[error("component `{0}` is declared more than once")]
    DuplicateComponent(String),
    #[error("component `{component}` references unknown component `{reference}`")]
    UnknownReference { component: String, reference: String },
    #[error("dependency cycle between components: {}", .0.join(", "))]
    Cycle(Vec<String>),
    #[error("wiring call `{call}` refers to unknown component `{reference}`")]
    UnknownWiringReference { call: String, reference: String },
    #[error("`{owner}` needs the address of `{reference}`, which is not deployed")]
    Unresolved { owner: String, reference: String },
}

/// A validated, topologically ordered view of a plan's components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    waves: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Validate the plan and order its components into deployment waves.
    ///
    /// Within a wave, components keep their plan order.
    pub fn resolve(plan: &DeploymentPlan) -> Result<Self, GraphError> {
        let components = &plan.components;
        if components.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut index = HashMap::with_capacity(components.len());
        for (i, component) in components.iter().enumerate() {
            if index.insert(component.name.as_str(), i).is_some() {
                return Err(GraphError::DuplicateComponent(component.name.clone()));
            }
        }

        let mut deps: Vec<HashSet<usize>> = Vec::with_capacity(components.len());
        for component in components {
            let mut set = HashSet::new();
            for reference in component.dependencies() {
                let Some(&dep) = index.get(reference) else {
                    return Err(GraphError::UnknownReference {
                        component: component.name.clone(),
                        reference: reference.to_string(),
                    });
                };
                set.insert(dep);
            }
            deps.push(set);
        }

        for call in &plan.wiring {
            for reference in std::iter::once(call.target.as_str()).chain(call.references()) {
                if !index.contains_key(reference) {
                    return Err(GraphError::UnknownWiringReference {
                        call: call.label(),
                        reference: reference.to_string(),
                    });
                }
            }
        }

        let mut placed = vec![false; components.len()];
        let mut waves = Vec::new();
        let mut remaining = components.len();

        while remaining > 0 {
            let wave: Vec<usize> = (0..components.len())
                .filter(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]))
                .collect();

            if wave.is_empty() {
                let stuck = (0..components.len())
                    .filter(|&i| !placed[i])
                    .map(|i| components[i].name.clone())
                    .collect();
                return Err(GraphError::Cycle(stuck));
            }

            for &i in &wave {
                placed[i] = true;
            }
            remaining -= wave.len();
            waves.push(wave);
        }

        Ok(Self { waves })
    }

    /// Deployment waves, as indexes into the plan's component list.
    pub fn waves(&self) -> &[Vec<usize>] {
        &self.waves
    }

    /// Flattened deployment order.
    pub fn order(&self) -> impl Iterator<Item = usize> + '_ {
        self.waves.iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::Address;

    use super::*;
    use crate::{
        descriptor::{ArgSlot, ComponentDescriptor, SourceRef},
        stack::StrategyStack,
        wiring::WiringCall,
    };

    fn component(name: &str, refs: &[&str]) -> ComponentDescriptor {
        refs.iter().fold(
            ComponentDescriptor::new(name, SourceRef::new(format!("contracts/{name}.sol"), name)),
            |c, r| c.arg(ArgSlot::reference(*r)),
        )
    }

    #[test]
    fn test_standard_stack_waves() {
        let plan = StrategyStack::new(Address::repeat_byte(1), Address::repeat_byte(2)).plan();
        let graph = DependencyGraph::resolve(&plan).unwrap();

        // Controller first, then Vault and Strategy together.
        assert_eq!(graph.waves(), &[vec![0], vec![1, 2]]);
        assert_eq!(graph.order().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dependencies_declared_out_of_order() {
        let plan = DeploymentPlan::new(vec![
            component("Strategy", &["Controller"]),
            component("Controller", &[]),
        ]);
        let graph = DependencyGraph::resolve(&plan).unwrap();
        assert_eq!(graph.waves(), &[vec![1], vec![0]]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let plan = DeploymentPlan::new(vec![
            component("Controller", &[]),
            component("A", &["B"]),
            component("B", &["A"]),
        ]);
        assert_eq!(
            DependencyGraph::resolve(&plan),
            Err(GraphError::Cycle(vec!["A".to_string(), "B".to_string()]))
        );
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let plan = DeploymentPlan::new(vec![component("Loop", &["Loop"])]);
        assert!(matches!(
            DependencyGraph::resolve(&plan),
            Err(GraphError::Cycle(_))
        ));
    }

    #[test]
    fn test_unknown_reference_and_duplicates() {
        let plan = DeploymentPlan::new(vec![component("Vault", &["Controller"])]);
        assert!(matches!(
            DependencyGraph::resolve(&plan),
            Err(GraphError::UnknownReference { .. })
        ));

        let plan = DeploymentPlan::new(vec![component("A", &[]), component("A", &[])]);
        assert_eq!(
            DependencyGraph::resolve(&plan),
            Err(GraphError::DuplicateComponent("A".to_string()))
        );

        assert_eq!(
            DependencyGraph::resolve(&DeploymentPlan::new(vec![])),
            Err(GraphError::Empty)
        );
    }

    #[test]
    fn test_wiring_must_reference_known_components() {
        let plan = DeploymentPlan::new(vec![component("Controller", &[])])
            .wire(WiringCall::new("Controller", "setVault").arg(ArgSlot::reference("Vault")));
        assert!(matches!(
            DependencyGraph::resolve(&plan),
            Err(GraphError::UnknownWiringReference { .. })
        ));
    }
}
