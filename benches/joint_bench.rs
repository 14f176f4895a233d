use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pivot2d::prelude::*;

// A hanging chain of bodies linked by revolute joints, swinging under
// gravity. This is the classic worst case for a sequential-impulse solver:
// every joint couples to its neighbors, so convergence depends on the
// Gauss-Seidel sweeps.
fn build_revolute_chain(num_links: usize) -> (RigidBodySet, JointSet) {
    let mut bodies = RigidBodySet::new();
    let mut joints = JointSet::new();

    let link_length = 1.0;
    let anchor = bodies.insert(RigidBodyBuilder::new_static().build());

    let mut previous = anchor;
    for i in 0..num_links {
        let x = (i + 1) as Real * link_length;
        let body = bodies.insert(RigidBodyBuilder::new_dynamic().translation(x, 0.0).build());
        let joint = RevoluteJoint::from_world_anchor(
            &bodies[previous],
            &bodies[body],
            Point::new(x - link_length * 0.5, 0.0),
        );
        joints.insert(&mut bodies, previous, Some(body), joint);
        previous = body;
    }

    (bodies, joints)
}

fn step_chain(bodies: &mut RigidBodySet, joints: &mut JointSet, steps: usize) {
    let params = IntegrationParameters::default();
    let mut solver = IslandSolver::new();
    let gravity = Vector::new(0.0, -9.81);

    for _ in 0..steps {
        solver.step(black_box(&gravity), &params, bodies, joints);
    }
}

fn chain_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("revolute_chain");

    for &num_links in &[10usize, 50, 200] {
        group.bench_function(format!("{num_links}_links_30_steps"), |b| {
            b.iter_batched(
                || build_revolute_chain(num_links),
                |(mut bodies, mut joints)| step_chain(&mut bodies, &mut joints, 30),
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, chain_benchmarks);
criterion_main!(benches);
