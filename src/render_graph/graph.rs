//! Render graph definition and compilation

use crate::backend::types::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Errors detected while compiling a render graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("pass '{pass}' reads '{resource}' but no earlier pass writes it")]
    ReadBeforeWrite { pass: String, resource: String },
    #[error("pass '{pass}' references unknown resource {resource:?}")]
    UnknownResource { pass: String, resource: ResourceId },
    #[error("render graph has a dependency cycle involving pass '{pass}'")]
    Cycle { pass: String },
}

/// The main render graph structure
pub struct RenderGraph {
    passes: Vec<Box<dyn RenderPass>>,
    pass_nodes: Vec<PassNode>,
    resources: Vec<VirtualResource>,
    next_pass_id: u32,
    next_resource_id: u32,
    screen_width: u32,
    screen_height: u32,

    /// External resources (like swapchain)
    external_resources: HashMap<String, ResourceId>,
}

impl RenderGraph {
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            passes: Vec::new(),
            pass_nodes: Vec::new(),
            resources: Vec::new(),
            next_pass_id: 0,
            next_resource_id: 0,
            screen_width,
            screen_height,
            external_resources: HashMap::new(),
        }
    }

    /// Register an external resource (like swapchain image)
    pub fn register_external(&mut self, name: &str) -> ResourceId {
        let id = ResourceId(self.next_resource_id);
        self.next_resource_id += 1;
        self.resources.push(VirtualResource::External {
            id,
            name: name.to_string(),
        });
        self.external_resources.insert(name.to_string(), id);
        id
    }

    /// Get external resource by name
    pub fn get_external(&self, name: &str) -> Option<ResourceId> {
        self.external_resources.get(name).copied()
    }

    /// Declare a transient texture owned by the graph
    pub fn create_texture(
        &mut self,
        name: &str,
        size: TextureSize,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> ResourceId {
        let id = ResourceId(self.next_resource_id);
        self.next_resource_id += 1;

        let (width, height) = size.resolve(self.screen_width, self.screen_height);
        self.resources.push(VirtualResource::Texture(VirtualTexture {
            id,
            desc: TextureDescriptor {
                label: Some(name.to_string()),
                width,
                height,
                format,
                usage,
            },
            name: name.to_string(),
        }));

        id
    }

    /// Add a render pass to the graph
    pub fn add_pass<P: RenderPass + 'static>(&mut self, pass: P) -> PassId {
        let id = PassId(self.next_pass_id);
        self.next_pass_id += 1;

        let name = pass.name().to_string();
        let mut boxed_pass = Box::new(pass);

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        {
            let mut ctx = PassSetupContext {
                inputs: &mut inputs,
                outputs: &mut outputs,
            };
            boxed_pass.setup(&mut ctx);
        }

        log::debug!(
            "Added pass '{}' ({} reads, {} writes)",
            name,
            inputs.len(),
            outputs.len()
        );

        self.passes.push(boxed_pass);
        self.pass_nodes.push(PassNode {
            id,
            name,
            inputs,
            outputs,
        });

        id
    }

    /// Validate resource usage and order passes.
    ///
    /// Dependencies follow insertion order: a pass depends on the latest
    /// earlier writer of everything it reads or writes, and a writer also
    /// waits for earlier readers of the value it overwrites. Ties in the
    /// topological sort go to the pass added first.
    pub fn compile(&self) -> Result<CompiledGraph, GraphError> {
        let known: HashSet<ResourceId> = self.resources.iter().map(|r| r.id()).collect();
        let external: HashSet<ResourceId> = self
            .resources
            .iter()
            .filter(|r| r.is_external())
            .map(|r| r.id())
            .collect();

        let count = self.pass_nodes.len();
        let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];
        let mut last_writer: HashMap<ResourceId, usize> = HashMap::new();
        let mut readers: HashMap<ResourceId, Vec<usize>> = HashMap::new();

        for (index, node) in self.pass_nodes.iter().enumerate() {
            for access in node.inputs.iter().chain(node.outputs.iter()) {
                if !known.contains(&access.resource) {
                    return Err(GraphError::UnknownResource {
                        pass: node.name.clone(),
                        resource: access.resource,
                    });
                }
            }

            for input in &node.inputs {
                match last_writer.get(&input.resource) {
                    Some(&writer) => {
                        dependencies[index].insert(writer);
                    }
                    None if input.optional || external.contains(&input.resource) => {}
                    None => {
                        return Err(GraphError::ReadBeforeWrite {
                            pass: node.name.clone(),
                            resource: self.resource_name(input.resource).to_string(),
                        });
                    }
                }
                readers.entry(input.resource).or_default().push(index);
            }

            for output in &node.outputs {
                if let Some(&writer) = last_writer.get(&output.resource) {
                    dependencies[index].insert(writer);
                }
                if let Some(previous_readers) = readers.remove(&output.resource) {
                    dependencies[index].extend(previous_readers.into_iter().filter(|&r| r != index));
                }
                last_writer.insert(output.resource, index);
            }
        }

        // Kahn's algorithm, lowest insertion index first
        let mut in_degree: Vec<usize> = dependencies.iter().map(|d| d.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (index, deps) in dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(index);
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(count);

        while let Some(index) = ready.pop_first() {
            sorted.push(index);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if sorted.len() < count {
            let stuck = (0..count).find(|i| !sorted.contains(i)).unwrap_or(0);
            return Err(GraphError::Cycle {
                pass: self.pass_nodes[stuck].name.clone(),
            });
        }

        let pass_order: Vec<PassId> = sorted.iter().map(|&i| self.pass_nodes[i].id).collect();
        log::debug!(
            "Compiled render graph: {}",
            sorted
                .iter()
                .map(|&i| self.pass_nodes[i].name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(CompiledGraph { pass_order })
    }

    /// Get all passes
    pub fn passes(&self) -> &[Box<dyn RenderPass>] {
        &self.passes
    }

    /// Get mutable passes
    pub fn passes_mut(&mut self) -> &mut [Box<dyn RenderPass>] {
        &mut self.passes
    }

    /// Get pass nodes (metadata)
    pub fn pass_nodes(&self) -> &[PassNode] {
        &self.pass_nodes
    }

    /// Get all resources
    pub fn resources(&self) -> &[VirtualResource] {
        &self.resources
    }

    /// Name a resource was declared with
    pub fn resource_name(&self, id: ResourceId) -> &str {
        self.resources
            .iter()
            .find(|r| r.id() == id)
            .map(|r| r.name())
            .unwrap_or("<unknown>")
    }

    /// Get pass by ID
    pub fn get_pass(&self, id: PassId) -> Option<&dyn RenderPass> {
        let index = self.pass_nodes.iter().position(|n| n.id == id)?;
        Some(self.passes[index].as_ref())
    }

    /// Get pass node by ID
    pub fn get_pass_node(&self, id: PassId) -> Option<&PassNode> {
        self.pass_nodes.iter().find(|n| n.id == id)
    }
}

/// Compiled render graph: passes in execution order
#[derive(Debug)]
pub struct CompiledGraph {
    pub pass_order: Vec<PassId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pass that only declares accesses
    struct Declared {
        name: &'static str,
        reads: Vec<ResourceId>,
        optional_reads: Vec<ResourceId>,
        writes: Vec<ResourceId>,
    }

    impl Declared {
        fn new(name: &'static str, reads: &[ResourceId], writes: &[ResourceId]) -> Self {
            Self {
                name,
                reads: reads.to_vec(),
                optional_reads: Vec::new(),
                writes: writes.to_vec(),
            }
        }
    }

    impl RenderPass for Declared {
        fn name(&self) -> &str {
            self.name
        }

        fn setup(&mut self, ctx: &mut PassSetupContext) {
            for &r in &self.reads {
                ctx.read(r, ResourceUsage::TextureRead);
            }
            for &r in &self.optional_reads {
                ctx.read_optional(r, ResourceUsage::TextureRead);
            }
            for &w in &self.writes {
                ctx.write(w, ResourceUsage::RenderTarget);
            }
        }

        fn execute(&self, _ctx: &mut PassExecuteContext) {}
    }

    fn texture(graph: &mut RenderGraph, name: &str) -> ResourceId {
        graph.create_texture(
            name,
            TextureSize::default(),
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        )
    }

    fn order_names(graph: &RenderGraph, compiled: &CompiledGraph) -> Vec<String> {
        compiled
            .pass_order
            .iter()
            .filter_map(|id| graph.get_pass_node(*id))
            .map(|n| n.name.clone())
            .collect()
    }

    #[test]
    fn test_compile_orders_writer_before_reader() {
        let mut graph = RenderGraph::new(64, 64);
        let a = texture(&mut graph, "a");
        let b = texture(&mut graph, "b");
        graph.add_pass(Declared::new("produce_a", &[], &[a]));
        graph.add_pass(Declared::new("a_to_b", &[a], &[b]));
        graph.add_pass(Declared::new("consume_b", &[b], &[]));

        let compiled = graph.compile().unwrap();
        assert_eq!(
            order_names(&graph, &compiled),
            vec!["produce_a", "a_to_b", "consume_b"]
        );
    }

    #[test]
    fn test_independent_passes_keep_insertion_order() {
        let mut graph = RenderGraph::new(64, 64);
        let a = texture(&mut graph, "a");
        let b = texture(&mut graph, "b");
        graph.add_pass(Declared::new("second_writer", &[], &[b]));
        graph.add_pass(Declared::new("first_writer", &[], &[a]));
        graph.add_pass(Declared::new("reader", &[a, b], &[]));

        let compiled = graph.compile().unwrap();
        assert_eq!(
            order_names(&graph, &compiled),
            vec!["second_writer", "first_writer", "reader"]
        );
    }

    #[test]
    fn test_read_before_write_is_rejected() {
        let mut graph = RenderGraph::new(64, 64);
        let a = texture(&mut graph, "orphan");
        graph.add_pass(Declared::new("reader", &[a], &[]));
        graph.add_pass(Declared::new("late_writer", &[], &[a]));

        assert_eq!(
            graph.compile().unwrap_err(),
            GraphError::ReadBeforeWrite {
                pass: "reader".into(),
                resource: "orphan".into(),
            }
        );
    }

    #[test]
    fn test_optional_read_without_writer_is_accepted() {
        let mut graph = RenderGraph::new(64, 64);
        let a = texture(&mut graph, "maybe");
        let out = texture(&mut graph, "out");
        let mut pass = Declared::new("reader", &[], &[out]);
        pass.optional_reads.push(a);
        graph.add_pass(pass);

        assert!(graph.compile().is_ok());
    }

    #[test]
    fn test_unknown_resource_is_rejected() {
        let mut graph = RenderGraph::new(64, 64);
        graph.add_pass(Declared::new("writer", &[], &[ResourceId(42)]));

        assert!(matches!(
            graph.compile(),
            Err(GraphError::UnknownResource { resource: ResourceId(42), .. })
        ));
    }

    #[test]
    fn test_overwrite_waits_for_earlier_readers() {
        let mut graph = RenderGraph::new(64, 64);
        let color = texture(&mut graph, "color");
        let copy = texture(&mut graph, "copy");
        graph.add_pass(Declared::new("draw", &[], &[color]));
        graph.add_pass(Declared::new("sample", &[color], &[copy]));
        graph.add_pass(Declared::new("overdraw", &[], &[color]));

        let compiled = graph.compile().unwrap();
        assert_eq!(
            order_names(&graph, &compiled),
            vec!["draw", "sample", "overdraw"]
        );
    }

    #[test]
    fn test_external_resources_may_be_written_without_reads() {
        let mut graph = RenderGraph::new(64, 64);
        let swapchain = graph.register_external("swapchain");
        graph.add_pass(Declared::new("present", &[], &[swapchain]));

        assert_eq!(graph.get_external("swapchain"), Some(swapchain));
        assert_eq!(graph.resource_name(swapchain), "swapchain");
        assert!(graph.compile().is_ok());
    }
}
