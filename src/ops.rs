//! Named groups of reusable operations.
//!
//! Groups keep their registration order, and operations keep their order
//! within a group. Running a subset of groups flattens them into a single
//! [`TaskChain`], so a later re-run of e.g. `plugins` does not repeat the
//! settings load.

use std::rc::Rc;

use crate::chain::{LinkFuture, TaskChain};

type SharedOp<C, T, E> = Rc<dyn for<'a> Fn(&'a mut C) -> LinkFuture<'a, T, E>>;

struct Operation<C, T, E> {
    name: String,
    run: SharedOp<C, T, E>,
}

struct Group<C, T, E> {
    name: String,
    ops: Vec<Operation<C, T, E>>,
}

pub struct OperationRegistry<C, T, E> {
    groups: Vec<Group<C, T, E>>,
}

impl<C: 'static, T: Default + 'static, E: 'static> OperationRegistry<C, T, E> {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Append `op` to `group`, creating the group on first use.
    pub fn register<F>(&mut self, group: &str, name: &str, op: F)
    where
        F: for<'a> Fn(&'a mut C) -> LinkFuture<'a, T, E> + 'static,
    {
        let operation = Operation {
            name: name.to_string(),
            run: Rc::new(op),
        };
        match self.groups.iter_mut().find(|g| g.name == group) {
            Some(g) => g.ops.push(operation),
            None => self.groups.push(Group {
                name: group.to_string(),
                ops: vec![operation],
            }),
        }
    }

    /// Group names in registration order.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Operation names of one group, in execution order.
    pub fn operation_names(&self, group: &str) -> Option<Vec<&str>> {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .map(|g| g.ops.iter().map(|op| op.name.as_str()).collect())
    }

    /// Flatten the selected groups into one chain.
    ///
    /// `None` selects every group in registration order. Unknown names are
    /// skipped. After each operation succeeds, `on_step(completed, total)`
    /// fires before the next operation starts.
    pub fn chain<S>(&self, groups: Option<&[&str]>, on_step: S) -> TaskChain<C, T, E>
    where
        S: Fn(usize, usize) + 'static,
    {
        let selected: Vec<&Group<C, T, E>> = match groups {
            None => self.groups.iter().collect(),
            Some(names) => names
                .iter()
                .filter_map(|name| {
                    let found = self.groups.iter().find(|g| g.name == *name);
                    if found.is_none() {
                        tracing::warn!(group = %name, "skipping unknown operation group");
                    }
                    found
                })
                .collect(),
        };

        let ops: Vec<&Operation<C, T, E>> = selected.into_iter().flat_map(|g| g.ops.iter()).collect();
        let total = ops.len();
        let on_step = Rc::new(on_step);

        let mut chain: TaskChain<C, T, E> = TaskChain::new();
        for (index, op) in ops.into_iter().enumerate() {
            let run = Rc::clone(&op.run);
            let name = op.name.clone();
            let on_step = Rc::clone(&on_step);
            chain.push(move |ctx| {
                Box::pin(async move {
                    tracing::debug!(operation = %name, "starting operation");
                    let value = run(ctx).await?;
                    on_step(index + 1, total);
                    Ok(value)
                })
            });
        }
        chain
    }

    /// Run the selected groups to completion or first failure.
    ///
    /// `Ok` carries the final operation's value; `Err` carries the first
    /// failure exactly as the operation produced it.
    pub async fn run_groups<S>(&self, groups: Option<&[&str]>, ctx: &mut C, on_step: S) -> Result<T, E>
    where
        S: Fn(usize, usize) + 'static,
    {
        self.chain(groups, on_step).run(ctx).await
    }
}

impl<C: 'static, T: Default + 'static, E: 'static> Default for OperationRegistry<C, T, E> {
    fn default() -> Self {
        Self::new()
    }
}
