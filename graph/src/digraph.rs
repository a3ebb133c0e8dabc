use crate::types::{ArcId, VertexId};

#[derive(Default, Debug, Clone)]
struct VertexEntry {
    out_arcs: Vec<ArcId>,
    in_arcs: Vec<ArcId>,
}

#[derive(Debug, Clone, Copy)]
struct ArcEntry {
    tail: VertexId,
    head: VertexId,
}

/// An arena-backed directed multigraph.
///
/// Vertex and arc handles are stable for the lifetime of the entity they
/// denote; the slots of removed entities are recycled LIFO. Self-loops and
/// parallel arcs are allowed. Adjacency lists preserve insertion order, and
/// arc removal keeps the relative order of the remaining arcs, so scans over
/// `map_outgoing_arcs`/`map_incoming_arcs` are deterministic.
#[derive(Default, Debug, Clone)]
pub struct DiGraph {
    vertices: Vec<Option<VertexEntry>>,
    free_vertices: Vec<usize>,
    arcs: Vec<Option<ArcEntry>>,
    free_arcs: Vec<usize>,
    num_vertices: usize,
    num_arcs: usize,
}

impl DiGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices currently in the graph.
    pub fn size(&self) -> usize {
        self.num_vertices
    }

    pub fn num_arcs(&self) -> usize {
        self.num_arcs
    }

    pub fn is_empty(&self) -> bool {
        self.num_vertices == 0
    }

    pub fn add_vertex(&mut self) -> VertexId {
        self.num_vertices += 1;
        match self.free_vertices.pop() {
            Some(i) => {
                self.vertices[i] = Some(VertexEntry::default());
                VertexId(i)
            }
            None => {
                self.vertices.push(Some(VertexEntry::default()));
                VertexId(self.vertices.len() - 1)
            }
        }
    }

    /// Removes `v` together with any arcs still incident to it.
    pub fn remove_vertex(&mut self, v: VertexId) {
        let entry = self.vertices[v.0].as_ref().expect("removal of a vertex that is not in the graph");
        let incident: Vec<ArcId> = entry.out_arcs.iter().chain(entry.in_arcs.iter()).copied().collect();
        for a in incident {
            // a loop appears in both lists but is removed on first sight
            if self.arcs[a.0].is_some() {
                self.remove_arc(a);
            }
        }
        self.vertices[v.0] = None;
        self.free_vertices.push(v.0);
        self.num_vertices -= 1;
    }

    pub fn contains_vertex(&self, v: VertexId) -> bool {
        self.vertices.get(v.0).is_some_and(|e| e.is_some())
    }

    pub fn add_arc(&mut self, tail: VertexId, head: VertexId) -> ArcId {
        assert!(self.contains_vertex(tail) && self.contains_vertex(head), "arc endpoints must exist");
        let entry = ArcEntry { tail, head };
        let a = match self.free_arcs.pop() {
            Some(i) => {
                self.arcs[i] = Some(entry);
                ArcId(i)
            }
            None => {
                self.arcs.push(Some(entry));
                ArcId(self.arcs.len() - 1)
            }
        };
        self.vertices[tail.0].as_mut().unwrap().out_arcs.push(a);
        self.vertices[head.0].as_mut().unwrap().in_arcs.push(a);
        self.num_arcs += 1;
        a
    }

    pub fn remove_arc(&mut self, a: ArcId) {
        let ArcEntry { tail, head } = self.arcs[a.0].take().expect("removal of an arc that is not in the graph");
        self.free_arcs.push(a.0);
        self.vertices[tail.0].as_mut().unwrap().out_arcs.retain(|&x| x != a);
        self.vertices[head.0].as_mut().unwrap().in_arcs.retain(|&x| x != a);
        self.num_arcs -= 1;
    }

    pub fn contains_arc(&self, a: ArcId) -> bool {
        self.arcs.get(a.0).is_some_and(|e| e.is_some())
    }

    pub fn tail(&self, a: ArcId) -> VertexId {
        self.arcs[a.0].expect("unknown arc").tail
    }

    pub fn head(&self, a: ArcId) -> VertexId {
        self.arcs[a.0].expect("unknown arc").head
    }

    /// `(tail, head)` of `a`, or `None` if the arc is gone.
    pub fn arc_ends(&self, a: ArcId) -> Option<(VertexId, VertexId)> {
        self.arcs.get(a.0).copied().flatten().map(|e| (e.tail, e.head))
    }

    pub fn is_loop(&self, a: ArcId) -> bool {
        let e = self.arcs[a.0].expect("unknown arc");
        e.tail == e.head
    }

    pub fn out_degree(&self, v: VertexId) -> usize {
        self.vertices[v.0].as_ref().expect("unknown vertex").out_arcs.len()
    }

    pub fn in_degree(&self, v: VertexId) -> usize {
        self.vertices[v.0].as_ref().expect("unknown vertex").in_arcs.len()
    }

    /// A vertex with no outgoing arcs.
    pub fn is_sink(&self, v: VertexId) -> bool {
        self.out_degree(v) == 0
    }

    /// A vertex with no incoming arcs.
    pub fn is_source(&self, v: VertexId) -> bool {
        self.in_degree(v) == 0
    }

    pub fn is_isolated(&self, v: VertexId) -> bool {
        self.is_sink(v) && self.is_source(v)
    }

    /// Some vertex of the graph, if any. Used as a fallback start vertex
    /// when no source was configured.
    pub fn any_vertex(&self) -> Option<VertexId> {
        self.vertices.iter().position(|e| e.is_some()).map(VertexId)
    }

    /// Applies `f` to every outgoing arc of `v` until `f` returns `true`.
    /// `f` receives `(arc, tail, head)`.
    pub fn map_outgoing_arcs_until(&self, v: VertexId, mut f: impl FnMut(ArcId, VertexId, VertexId) -> bool) {
        for &a in &self.vertices[v.0].as_ref().expect("unknown vertex").out_arcs {
            let e = self.arcs[a.0].expect("dangling adjacency entry");
            if f(a, e.tail, e.head) {
                break;
            }
        }
    }

    /// Applies `f` to every incoming arc of `v` until `f` returns `true`.
    /// `f` receives `(arc, tail, head)`.
    pub fn map_incoming_arcs_until(&self, v: VertexId, mut f: impl FnMut(ArcId, VertexId, VertexId) -> bool) {
        for &a in &self.vertices[v.0].as_ref().expect("unknown vertex").in_arcs {
            let e = self.arcs[a.0].expect("dangling adjacency entry");
            if f(a, e.tail, e.head) {
                break;
            }
        }
    }

    pub fn map_outgoing_arcs(&self, v: VertexId, mut f: impl FnMut(ArcId, VertexId, VertexId)) {
        self.map_outgoing_arcs_until(v, |a, t, h| {
            f(a, t, h);
            false
        })
    }

    pub fn map_incoming_arcs(&self, v: VertexId, mut f: impl FnMut(ArcId, VertexId, VertexId)) {
        self.map_incoming_arcs_until(v, |a, t, h| {
            f(a, t, h);
            false
        })
    }

    pub fn map_vertices(&self, mut f: impl FnMut(VertexId)) {
        for (i, e) in self.vertices.iter().enumerate() {
            if e.is_some() {
                f(VertexId(i));
            }
        }
    }

    pub fn map_arcs(&self, mut f: impl FnMut(ArcId, VertexId, VertexId)) {
        for (i, e) in self.arcs.iter().enumerate() {
            if let Some(e) = e {
                f(ArcId(i), e.tail, e.head);
            }
        }
    }

    /// Finds some arc `tail -> head`, scanning the smaller of the two
    /// incidence lists.
    pub fn find_arc(&self, tail: VertexId, head: VertexId) -> Option<ArcId> {
        if !self.contains_vertex(tail) || !self.contains_vertex(head) {
            return None;
        }
        let mut found = None;
        if self.out_degree(tail) <= self.in_degree(head) {
            self.map_outgoing_arcs_until(tail, |a, _, h| {
                if h == head {
                    found = Some(a)
                }
                found.is_some()
            });
        } else {
            self.map_incoming_arcs_until(head, |a, t, _| {
                if t == tail {
                    found = Some(a)
                }
                found.is_some()
            });
        }
        found
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.free_vertices.clear();
        self.arcs.clear();
        self.free_arcs.clear();
        self.num_vertices = 0;
        self.num_arcs = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_basics() {
        let mut g = DiGraph::new();
        let u = g.add_vertex();
        let v = g.add_vertex();
        let w = g.add_vertex();
        let a = g.add_arc(u, v);
        let b = g.add_arc(v, w);
        assert_eq!(g.size(), 3);
        assert_eq!(g.num_arcs(), 2);
        assert_eq!((g.tail(a), g.head(a)), (u, v));
        assert!(g.is_source(u) && g.is_sink(w));
        assert!(!g.is_sink(u) && !g.is_source(w));

        g.remove_arc(a);
        assert_eq!(g.num_arcs(), 1);
        assert!(!g.contains_arc(a));
        assert!(g.contains_arc(b));
        assert!(g.is_isolated(u));

        // the freed slot is recycled, the surviving arc keeps its handle
        let c = g.add_arc(w, u);
        assert_eq!(c, a);
        assert_eq!((g.tail(b), g.head(b)), (v, w));
    }

    #[test]
    fn test_vertex_removal_drops_incident_arcs() {
        let mut g = DiGraph::new();
        let u = g.add_vertex();
        let v = g.add_vertex();
        let w = g.add_vertex();
        g.add_arc(u, v);
        g.add_arc(v, w);
        g.add_arc(v, v);
        g.remove_vertex(v);
        assert_eq!(g.size(), 2);
        assert_eq!(g.num_arcs(), 0);
        assert!(g.is_isolated(u) && g.is_isolated(w));
        // the slot is reused by the next insertion
        assert_eq!(g.add_vertex(), v);
    }

    #[test]
    fn test_parallel_arcs_and_find() {
        let mut g = DiGraph::new();
        let u = g.add_vertex();
        let v = g.add_vertex();
        let a1 = g.add_arc(u, v);
        let a2 = g.add_arc(u, v);
        assert_ne!(a1, a2);
        assert_eq!(g.num_arcs(), 2);
        let found = g.find_arc(u, v).unwrap();
        assert!(found == a1 || found == a2);
        assert_eq!(g.find_arc(v, u), None);
    }

    #[test]
    fn test_scan_order_is_insertion_order() {
        let mut g = DiGraph::new();
        let u = g.add_vertex();
        let heads: Vec<_> = (0..4).map(|_| g.add_vertex()).collect();
        let arcs: Vec<_> = heads.iter().map(|&h| g.add_arc(u, h)).collect();
        g.remove_arc(arcs[1]);
        let mut seen = Vec::new();
        g.map_outgoing_arcs(u, |a, _, _| seen.push(a));
        assert_eq!(seen, vec![arcs[0], arcs[2], arcs[3]]);
    }

    #[test]
    fn test_bounded_scan_stops() {
        let mut g = DiGraph::new();
        let u = g.add_vertex();
        for _ in 0..5 {
            let h = g.add_vertex();
            g.add_arc(u, h);
        }
        let mut count = 0;
        g.map_outgoing_arcs_until(u, |_, _, _| {
            count += 1;
            count >= 2
        });
        assert_eq!(count, 2);
    }
}
