//! Stage traversal and distribution of prims over threads.
//!
//! Every walker visits the whole hierarchy so it can keep its own stack of
//! inherited primvars, but only converts the prims whose visit index falls
//! on its thread. A walker either converts its prims itself or, when it is
//! the only walker, spawns one job per prim.

use std::sync::Arc;

use strata_scene::{Prim, PrimRange, Primvar, Visit};

use crate::context::{ContextRef, JobContext, ThreadContext};
use crate::session::Session;

/// How a walker gets its prims converted.
pub(crate) enum Dispatch<'c, 'scope> {
    /// On the walking thread, with exclusive use of its context
    Inline(&'c mut ThreadContext),
    /// As jobs on `scope`, sharing `thread` with the walker
    Spawn {
        scope: &'c rayon::Scope<'scope>,
        thread: &'scope ThreadContext,
    },
}

/// Whether `prim` and its descendants are left out of the render: hidden,
/// or made for another purpose than `purpose`.
fn is_pruned(prim: &Prim<'_>, frame: f32, purpose: &str) -> bool {
    if !prim.is_imageable() && !prim.type_name().starts_with("Arnold") {
        return false;
    }
    if prim.visibility(frame as f64) == "invisible" {
        return true;
    }
    let prim_purpose = prim.purpose();
    prim_purpose != "default" && prim_purpose != purpose
}

/// Walk `root` as walker `thread_id` of `thread_count`.
pub(crate) fn walk<'scope, 'a: 'scope>(
    session: &'scope Session<'a>,
    root: Prim<'a>,
    thread_id: usize,
    thread_count: usize,
    mut dispatch: Dispatch<'_, 'scope>,
) {
    let multithread = thread_count > 1;
    let frame = session.time.frame;
    let purpose = session.config.purpose.as_str();

    let mut index = 0usize;
    let mut primvars: Vec<Arc<Vec<Primvar<'a>>>> = vec![Arc::default()];
    let mut range = PrimRange::pre_and_post(root);

    while let Some(Visit { prim, post }) = range.next() {
        let is_instance = prim.is_instanceable();
        if !prim.is_typed() && !is_instance {
            continue;
        }

        if post {
            if primvars.len() > 1 {
                primvars.pop();
            }
            continue;
        }

        let inherited = primvars.last().cloned().unwrap_or_default();
        let local = prim.find_incrementally_inheritable_primvars(&inherited);
        let current = if local.is_empty() { inherited } else { Arc::new(local) };
        primvars.push(current.clone());

        if is_pruned(&prim, frame, purpose) {
            range.prune_children();
            continue;
        }

        if multithread {
            let skip = (index + thread_id) % thread_count != 0;
            index += 1;
            if skip {
                continue;
            }
        }

        match &mut dispatch {
            Dispatch::Inline(thread) => {
                let mut ctx = JobContext::new(session, ContextRef::Exclusive(&mut **thread), current);
                session.read_primitive(prim, &mut ctx, is_instance);
            }
            Dispatch::Spawn { scope, thread } => {
                let thread: &'scope ThreadContext = *thread;
                let mut ctx = JobContext::new(session, ContextRef::Shared(thread), current.clone());
                if is_instance {
                    session.read_primitive(prim, &mut ctx, true);
                    continue;
                }
                let Some(reader) = session.prim_reader(&prim) else {
                    continue;
                };

                let matrices = reader
                    .reads_transform()
                    .then(|| ctx.matrix_samples(&prim, prim.is_xformable()));
                scope.spawn(move |_| {
                    let mut job = JobContext::new(session, ContextRef::Shared(thread), current);
                    if let Some(matrices) = matrices {
                        job = job.with_matrices(matrices);
                    }
                    session.run_reader(reader, prim, &mut job);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_scene::Stage;

    const SCENE: &str = r#"#usda 1.0
def Xform "World" {
    def Sphere "Shown" {}
    def Sphere "Hidden" {
        token visibility = "invisible"
    }
    def Sphere "Proxy" {
        uniform token purpose = "proxy"
    }
    def Sphere "Render" {
        uniform token purpose = "render"
    }
    def ArnoldOptions "Hidden2" {
        token visibility = "invisible"
    }
    def Material "Mat" {}
}
"#;

    #[test]
    fn test_pruning() {
        let stage = Stage::from_string(SCENE).unwrap();
        let pruned = |path: &str| is_pruned(&stage.prim_at_path(path).unwrap(), 1.0, "render");

        assert!(!pruned("/World/Shown"));
        assert!(pruned("/World/Hidden"));
        assert!(pruned("/World/Proxy"));
        assert!(!pruned("/World/Render"));
        assert!(pruned("/World/Hidden2"));
        assert!(!pruned("/World/Mat"));
    }
}
