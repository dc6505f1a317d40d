//! Chunk type and the lazy chunk planner.

/// One contiguous sub-range of the requested range, fetched by one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub id: usize,
    /// Absolute offset in the remote resource.
    pub start: u64,
    pub size: u64,
    /// Dispatched together with a new worker; its first good response starts
    /// the next one.
    pub triggers_next_worker: bool,
}

impl Chunk {
    /// Absolute end offset (exclusive).
    pub fn end(&self) -> u64 {
        self.start + self.size
    }
}

/// Number of parts a range of `length` bytes splits into.
pub fn max_part(length: u64, part_size: u64) -> usize {
    if part_size == 0 {
        return 0;
    }
    length.div_ceil(part_size) as usize
}

/// Size of chunk `id` before clamping to what is left.
///
/// The remainder `length % part_size` is served first so the earliest bytes
/// arrive sooner. A remainder below half a part is folded into a half-part
/// first chunk, and chunk 1 absorbs the difference.
pub fn chunk_size(id: usize, length: u64, part_size: u64) -> u64 {
    let remainder = length % part_size;
    let half = part_size / 2;
    match id {
        0 if remainder > 0 => {
            if remainder < half {
                half
            } else {
                remainder
            }
        }
        1 if remainder > 0 && remainder < half => part_size + remainder - half,
        _ => part_size,
    }
}

/// Produces chunks on demand, in id order, covering `[start, start+length)`.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    part_size: u64,
    length: u64,
    pos: u64,
    max_pos: u64,
    next_id: usize,
}

impl ChunkPlanner {
    pub fn new(start: u64, length: u64, part_size: u64) -> Self {
        Self {
            part_size: part_size.max(1),
            length,
            pos: start,
            max_pos: start + length,
            next_id: 0,
        }
    }

    /// Plan the next chunk, or `None` once the range is covered.
    pub fn next_chunk(&mut self, triggers_next_worker: bool) -> Option<Chunk> {
        if self.pos >= self.max_pos {
            return None;
        }
        let size = chunk_size(self.next_id, self.length, self.part_size)
            .min(self.max_pos - self.pos);
        let chunk = Chunk {
            id: self.next_id,
            start: self.pos,
            size,
            triggers_next_worker,
        };
        self.pos += size;
        self.next_id += 1;
        Some(chunk)
    }

    /// Id the next planned chunk will get.
    pub fn next_id(&self) -> usize {
        self.next_id
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.max_pos
    }
}
