//! Call sites shared between threads.

mod common;

use std::thread;

use common::World;
use ember_bind::{CallSiteId, OperationDescriptor, ParamType, Tier, Value};

#[test]
fn test_shared_site_stays_correct_under_contention() {
    let w = World::new();
    let classes: Vec<_> = (0..3)
        .map(|i| {
            let class = w.table.define_class(&format!("K{}", i), w.b.object);
            w.table.define_method(
                class,
                "add",
                |c| c.param(ParamType::Type(w.b.integer)),
                move |_, args| Ok(Value::Int(i * 100 + args[0].as_int().unwrap_or(0))),
            );
            class
        })
        .collect();
    let site = w
        .runtime
        .site(CallSiteId::new(1), &OperationDescriptor::call("add", 1))
        .unwrap();

    thread::scope(|scope| {
        for t in 0..8_i64 {
            let w = &w;
            let site = &site;
            let classes = &classes;
            scope.spawn(move || {
                for n in 0..200_i64 {
                    let k = ((t + n) % 3) as usize;
                    let receiver = w.instance(classes[k]);
                    let result = w.runtime.dispatch_at(site, &receiver, vec![Value::Int(n)]).unwrap();
                    assert_eq!(result, Value::Int(k as i64 * 100 + n));
                }
            });
        }
    });

    // Three shapes fit in the chain; racing writers never duplicate a rule.
    assert_eq!(site.tier(), Tier::Polymorphic);
    assert_eq!(site.chain().rules.len(), 3);
    let stats = site.stats().snapshot();
    assert_eq!(stats.hits + stats.misses, 1600);
    assert!(stats.resolutions >= 3);
}

#[test]
fn test_runtimes_do_not_share_sites() {
    let a = World::new();
    let b = World::new();
    a.table.define_method(a.b.integer, "f", |c| c, |_, _| Ok(Value::Int(1)));
    b.table.define_method(b.b.integer, "f", |c| c, |_, _| Ok(Value::Int(2)));

    thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..50 {
                assert_eq!(a.call(1, "f", &Value::Int(0), vec![]).unwrap(), Value::Int(1));
            }
        });
        scope.spawn(|| {
            for _ in 0..50 {
                assert_eq!(b.call(1, "f", &Value::Int(0), vec![]).unwrap(), Value::Int(2));
            }
        });
    });

    assert_eq!(a.resolutions(1), 1);
    assert_eq!(b.resolutions(1), 1);
}
