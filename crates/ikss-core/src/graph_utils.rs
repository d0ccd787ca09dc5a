use crate::{BusId, Edge, Network, Node};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

/// A set of buses joined by in-service branches.
#[derive(Debug, Clone)]
pub struct Island {
    pub island_id: usize,
    /// Member buses in discovery order
    pub buses: Vec<BusId>,
    /// In-service branches inside the island
    pub branch_count: usize,
    /// Whether a grid or an impedance machine is connected
    pub energized: bool,
}

impl Island {
    /// An island is meshed when it carries more branches than a spanning
    /// tree (parallel branches count as a mesh).
    pub fn is_meshed(&self) -> bool {
        self.branch_count + 1 > self.buses.len()
    }
}

/// Aggregated island analysis result.
#[derive(Debug, Clone, Default)]
pub struct IslandAnalysis {
    pub islands: Vec<Island>,
    assignments: HashMap<BusId, usize>,
}

impl IslandAnalysis {
    pub fn island_of(&self, bus: BusId) -> Option<&Island> {
        self.assignments
            .get(&bus)
            .and_then(|&idx| self.islands.get(idx))
    }

    /// True when the bus can be reached by fault current from an impedance source
    pub fn is_energized(&self, bus: BusId) -> bool {
        self.island_of(bus).is_some_and(|island| island.energized)
    }

    /// Buses of energized islands, island by island
    pub fn energized_buses(&self) -> Vec<BusId> {
        self.islands
            .iter()
            .filter(|island| island.energized)
            .flat_map(|island| island.buses.iter().copied())
            .collect()
    }

    /// Buses with no path to any impedance source
    pub fn dead_buses(&self) -> Vec<BusId> {
        self.islands
            .iter()
            .filter(|island| !island.energized)
            .flat_map(|island| island.buses.iter().copied())
            .collect()
    }
}

/// Labels connected components of buses (breadth-first search over
/// in-service branches) and tags each island with whether it is energized.
///
/// Current-source machines do not energize an island: they need an
/// impedance path to ground to drive any fault current.
pub fn find_islands(network: &Network) -> IslandAnalysis {
    let graph = &network.graph;

    let mut sources: HashSet<BusId> = HashSet::new();
    for node in graph.node_weights() {
        match node {
            Node::Grid(g) if g.in_service => {
                sources.insert(g.bus);
            }
            Node::Machine(m) if m.in_service && !m.is_current_source() => {
                sources.insert(m.bus);
            }
            _ => {}
        }
    }

    let mut visited = HashSet::new();
    let mut analysis = IslandAnalysis::default();

    for start in graph.node_indices() {
        if !matches!(graph[start], Node::Bus(_)) || visited.contains(&start) {
            continue;
        }
        let island_id = analysis.islands.len();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = Vec::new();
        let mut branches = HashSet::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            if let Node::Bus(bus) = &graph[node] {
                members.push(bus.id);
            }
            for edge in graph.edges(node) {
                let Edge::Branch(branch) = edge.weight();
                if !branch.in_service || edge.source() == edge.target() {
                    continue;
                }
                branches.insert(edge.id());
                let neighbor = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        let energized = members.iter().any(|bus| sources.contains(bus));
        for bus in &members {
            analysis.assignments.entry(*bus).or_insert(island_id);
        }
        analysis.islands.push(Island {
            island_id,
            buses: members,
            branch_count: branches.len(),
            energized,
        });
    }

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;

    fn bus(network: &mut Network, id: usize) {
        network.add_bus(Bus::new(BusId::new(id), format!("Bus {id}"), Kilovolts(10.0)));
    }

    fn line(network: &mut Network, id: usize, from: usize, to: usize) -> Branch {
        let branch = Branch::from_line_parameters(
            BranchId::new(id),
            format!("Line {id}"),
            BusId::new(from),
            BusId::new(to),
            0.1,
            0.3,
            1.0,
        );
        network.add_branch(branch.clone()).unwrap();
        branch
    }

    #[test]
    fn isolated_bus_forms_dead_island() {
        let mut network = Network::new();
        for id in 0..4 {
            bus(&mut network, id);
        }
        line(&mut network, 0, 0, 1);
        line(&mut network, 1, 2, 3);
        network.add_grid(GridSource::new(
            GridId::new(0),
            "Grid",
            BusId::new(0),
            MegavoltAmperes(100.0),
            0.1,
        ));
        network.add_machine(
            MachineSource::new(
                MachineId::new(0),
                "Inverter",
                BusId::new(3),
                KilovoltAmperes(100.0),
                1.2,
                0.1,
            )
            .as_current_source(),
        );

        let islands = find_islands(&network);
        assert_eq!(islands.islands.len(), 2);
        assert!(islands.is_energized(BusId::new(1)));
        assert!(!islands.is_energized(BusId::new(3)));
        assert_eq!(islands.energized_buses(), vec![BusId::new(0), BusId::new(1)]);
        assert_eq!(islands.dead_buses().len(), 2);
    }

    #[test]
    fn out_of_service_branch_splits_island() {
        let mut network = Network::new();
        bus(&mut network, 0);
        bus(&mut network, 1);
        let branch = Branch::from_line_parameters(
            BranchId::new(0),
            "Open",
            BusId::new(0),
            BusId::new(1),
            0.1,
            0.3,
            1.0,
        )
        .out_of_service();
        network.add_branch(branch).unwrap();

        let islands = find_islands(&network);
        assert_eq!(islands.islands.len(), 2);
        assert!(islands.dead_buses().contains(&BusId::new(1)));
    }

    #[test]
    fn meshed_detection_counts_parallel_branches() {
        let mut network = Network::new();
        for id in 0..3 {
            bus(&mut network, id);
        }
        line(&mut network, 0, 0, 1);
        line(&mut network, 1, 1, 2);

        let radial = find_islands(&network);
        assert!(!radial.island_of(BusId::new(0)).unwrap().is_meshed());

        line(&mut network, 2, 1, 2);
        let meshed = find_islands(&network);
        let island = meshed.island_of(BusId::new(2)).unwrap();
        assert_eq!(island.branch_count, 3);
        assert!(island.is_meshed());
    }
}
