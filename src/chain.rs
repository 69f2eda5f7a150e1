//! Strictly sequential execution of asynchronous links.
//!
//! A link borrows the shared context mutably for the duration of its future,
//! so link N+1 cannot start before link N resolves. The first `Err` stops the
//! chain and is returned untouched.

use futures_util::future::LocalBoxFuture;

/// Future produced by a single link.
pub type LinkFuture<'a, T, E> = LocalBoxFuture<'a, Result<T, E>>;

type BoxedLink<C, T, E> = Box<dyn for<'a> FnOnce(&'a mut C) -> LinkFuture<'a, T, E>>;

/// An ordered list of one-shot asynchronous operations over a context `C`.
pub struct TaskChain<C, T, E> {
    links: Vec<BoxedLink<C, T, E>>,
}

impl<C: 'static, T: Default + 'static, E: 'static> TaskChain<C, T, E> {
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Append a link to the end of the chain.
    pub fn push<F>(&mut self, link: F)
    where
        F: for<'a> FnOnce(&'a mut C) -> LinkFuture<'a, T, E> + 'static,
    {
        self.links.push(Box::new(link));
    }

    /// Builder form of [`push`](Self::push).
    pub fn then<F>(mut self, link: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut C) -> LinkFuture<'a, T, E> + 'static,
    {
        self.push(link);
        self
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Run every link in order.
    ///
    /// Resolves with the last link's value, or `T::default()` for an empty
    /// chain.
    pub async fn run(self, ctx: &mut C) -> Result<T, E> {
        let total = self.links.len();
        let mut last = T::default();
        for (index, link) in self.links.into_iter().enumerate() {
            tracing::debug!(link = index + 1, total, "running chain link");
            last = link(&mut *ctx).await?;
        }
        Ok(last)
    }

    /// Turn the whole chain into a single link, so chains nest inside chains.
    pub fn into_link(self) -> impl for<'a> FnOnce(&'a mut C) -> LinkFuture<'a, T, E> + 'static {
        move |ctx| Box::pin(self.run(ctx))
    }
}

impl<C: 'static, T: Default + 'static, E: 'static> Default for TaskChain<C, T, E> {
    fn default() -> Self {
        Self::new()
    }
}
