//! Per-package symbol-reference graph.
//!
//! Nodes are the package's top-level declared objects plus imported package
//! names; an edge `d -> o` exists when declaration `d` mentions object `o`.
//! Buckets follow declaration structure: every function, var/const spec, and
//! type spec gets its own bucket, all `init` functions share one, and a type
//! name implicitly references the methods declared on it.

use std::collections::{BTreeMap, BTreeSet};

use vulnreach_core::graph::{Decl, ObjectId, Package, PackageGraph, Spec};

#[derive(Debug, Default)]
pub struct RefGraph {
    /// Top-level declaration to the set of objects it references.
    refs: BTreeMap<ObjectId, BTreeSet<ObjectId>>,
    /// Type name to the methods declared on it.
    methods: BTreeMap<ObjectId, Vec<ObjectId>>,
    /// Imported package-name objects.
    imports: BTreeSet<ObjectId>,
}

impl RefGraph {
    /// Builds the reference graph for one package in a single pass over its
    /// top-level declarations.
    pub fn build(graph: &PackageGraph, pkg: &Package) -> Self {
        let mut refs: BTreeMap<ObjectId, BTreeSet<ObjectId>> = BTreeMap::new();
        let mut methods: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
        let mut imports = BTreeSet::new();
        let mut init_members: Vec<ObjectId> = Vec::new();
        let mut init_bucket: BTreeSet<ObjectId> = BTreeSet::new();

        for decl in &pkg.decls {
            match decl {
                Decl::Func(f) => {
                    let bucket: BTreeSet<ObjectId> = f.refs.iter().copied().collect();
                    if let Some(recv) = f.receiver {
                        methods.entry(recv).or_default().push(f.object);
                    }
                    let obj = graph.object(f.object);
                    if obj.receiver.is_none() && obj.name == "init" {
                        init_bucket.extend(bucket);
                        init_members.push(f.object);
                    } else {
                        refs.insert(f.object, bucket);
                    }
                }
                Decl::Gen(g) => {
                    for spec in &g.specs {
                        match spec {
                            Spec::Value(v) => {
                                let bucket: BTreeSet<ObjectId> =
                                    v.refs.iter().copied().collect();
                                for &name in &v.names {
                                    refs.insert(name, bucket.clone());
                                }
                            }
                            Spec::Type(t) => {
                                refs.insert(t.name, t.refs.iter().copied().collect());
                            }
                        }
                    }
                }
                Decl::Import(i) => {
                    imports.insert(i.object);
                }
            }
        }

        // All initializers observe the union of their references.
        for id in init_members {
            refs.insert(id, init_bucket.clone());
        }

        RefGraph {
            refs,
            methods,
            imports,
        }
    }

    /// Top-level declared members, in object-id order. Analysis sorts by
    /// qualified name before iterating.
    pub fn members(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.refs.keys().copied()
    }

    /// Imported package-name objects.
    pub fn imports(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.imports.iter().copied()
    }

    /// Direct successors of `obj`: its bucket ordered by qualified object
    /// name, then the methods declared on it for type names.
    pub fn successors(&self, graph: &PackageGraph, obj: ObjectId) -> Vec<ObjectId> {
        let mut result: Vec<ObjectId> = self
            .refs
            .get(&obj)
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default();
        result.sort_by_key(|&id| graph.object(id).qualified_name());
        if let Some(methods) = self.methods.get(&obj) {
            let mut methods = methods.clone();
            methods.sort_by_key(|&id| graph.object(id).qualified_name());
            result.extend(methods);
        }
        result
    }

    pub fn member_count(&self) -> usize {
        self.refs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vulnreach_core::graph::{
        FuncDecl, GenDecl, GraphBuilder, ImportDecl, Package, Position, TypeSpec, ValueSpec,
    };

    fn pos(line: u32) -> Position {
        Position::new("p.go", line, 1)
    }

    struct Fixture {
        graph: PackageGraph,
    }

    impl Fixture {
        fn refgraph(&self) -> RefGraph {
            RefGraph::build(&self.graph, self.graph.package("p").unwrap())
        }
    }

    fn fixture(build: impl FnOnce(&mut GraphBuilder) -> Vec<Decl>) -> Fixture {
        let mut b = GraphBuilder::new();
        let decls = build(&mut b);
        b.package(Package {
            path: "p".to_string(),
            module: None,
            imports: vec![],
            decls,
        });
        b.root("p");
        Fixture {
            graph: b.build().unwrap(),
        }
    }

    #[test]
    fn function_bucket_holds_its_references() {
        let mut f_id = None;
        let mut g_id = None;
        let fx = fixture(|b| {
            let f = b.func("p", "F", pos(1));
            let g = b.func("p", "G", pos(2));
            f_id = Some(f);
            g_id = Some(g);
            vec![
                Decl::Func(FuncDecl {
                    object: f,
                    receiver: None,
                    refs: vec![g],
                }),
                Decl::Func(FuncDecl {
                    object: g,
                    receiver: None,
                    refs: vec![],
                }),
            ]
        });
        let rg = fx.refgraph();
        assert_eq!(rg.successors(&fx.graph, f_id.unwrap()), vec![g_id.unwrap()]);
        assert!(rg.successors(&fx.graph, g_id.unwrap()).is_empty());
    }

    #[test]
    fn value_spec_names_share_one_bucket() {
        let mut ids = None;
        let fx = fixture(|b| {
            let f = b.func("p", "F", pos(1));
            let a = b.var("p", "A", pos(2));
            let c = b.var("p", "B", pos(2));
            ids = Some((a, c, f));
            vec![
                Decl::Gen(GenDecl {
                    specs: vec![Spec::Value(ValueSpec {
                        names: vec![a, c],
                        refs: vec![f],
                    })],
                }),
                Decl::Func(FuncDecl {
                    object: f,
                    receiver: None,
                    refs: vec![],
                }),
            ]
        });
        let (a, c, f) = ids.unwrap();
        let rg = fx.refgraph();
        assert_eq!(rg.successors(&fx.graph, a), vec![f]);
        assert_eq!(rg.successors(&fx.graph, c), vec![f]);
    }

    #[test]
    fn type_name_references_its_methods() {
        let mut ids = None;
        let fx = fixture(|b| {
            let t = b.type_name("p", "Conn", pos(1));
            let m = b.method("p", "Conn", "Close", pos(2));
            ids = Some((t, m));
            vec![
                Decl::Gen(GenDecl {
                    specs: vec![Spec::Type(TypeSpec {
                        name: t,
                        refs: vec![],
                    })],
                }),
                Decl::Func(FuncDecl {
                    object: m,
                    receiver: Some(t),
                    refs: vec![],
                }),
            ]
        });
        let (t, m) = ids.unwrap();
        let rg = fx.refgraph();
        assert_eq!(rg.successors(&fx.graph, t), vec![m]);
    }

    #[test]
    fn init_functions_share_a_bucket() {
        let mut ids = None;
        let fx = fixture(|b| {
            let init1 = b.func("p", "init", pos(1));
            let init2 = b.func("p", "init", pos(5));
            let f = b.func("p", "F", pos(10));
            let g = b.func("p", "G", pos(11));
            ids = Some((init1, init2, f, g));
            vec![
                Decl::Func(FuncDecl {
                    object: init1,
                    receiver: None,
                    refs: vec![f],
                }),
                Decl::Func(FuncDecl {
                    object: init2,
                    receiver: None,
                    refs: vec![g],
                }),
                Decl::Func(FuncDecl {
                    object: f,
                    receiver: None,
                    refs: vec![],
                }),
                Decl::Func(FuncDecl {
                    object: g,
                    receiver: None,
                    refs: vec![],
                }),
            ]
        });
        let (init1, init2, f, g) = ids.unwrap();
        let rg = fx.refgraph();
        assert_eq!(rg.successors(&fx.graph, init1), vec![f, g]);
        assert_eq!(rg.successors(&fx.graph, init2), vec![f, g]);
    }

    #[test]
    fn imports_are_tracked_separately() {
        let mut id = None;
        let fx = fixture(|b| {
            let imp = b.pkg_name("p", "vuln", "b.com/m/vuln", pos(1));
            id = Some(imp);
            vec![Decl::Import(ImportDecl { object: imp })]
        });
        let rg = fx.refgraph();
        assert_eq!(rg.imports().collect::<Vec<_>>(), vec![id.unwrap()]);
        assert_eq!(rg.member_count(), 0);
    }

    #[test]
    fn successors_are_ordered_by_qualified_name() {
        let mut ids = None;
        let fx = fixture(|b| {
            let f = b.func("p", "F", pos(1));
            // Interned later, but sorts earlier by name.
            let a = b.func("p", "A", pos(2));
            let z = b.func("p", "Z", pos(3));
            ids = Some((f, a, z));
            vec![
                Decl::Func(FuncDecl {
                    object: f,
                    receiver: None,
                    refs: vec![z, a],
                }),
                Decl::Func(FuncDecl {
                    object: a,
                    receiver: None,
                    refs: vec![],
                }),
                Decl::Func(FuncDecl {
                    object: z,
                    receiver: None,
                    refs: vec![],
                }),
            ]
        });
        let (f, a, z) = ids.unwrap();
        let rg = fx.refgraph();
        assert_eq!(rg.successors(&fx.graph, f), vec![a, z]);
    }
}
