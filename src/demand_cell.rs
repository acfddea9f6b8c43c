use super::demand_reader::MAX_GROUPS;


/// One quantity of demand between an origin and a destination node, for a given commodity
/// group.
///
/// Cells are built by the demand reader and only change through `add_quantity` (repeated OD
/// rows), `relocate` (time dependent re-assignment) and `set_path_index`.
#[derive(PartialEq, Debug, Clone)]
pub struct DemandCell {
    group: u8,
    origin_node_id: i32,
    destination_node_id: i32,
    quantity: f64,
    // intermediate origin and starting time, moved around by time dependent assignments
    relocated_origin_node_id: i32,
    relocated_starting_time_s: Option<u32>,
    // seconds after midnight, None if the demand is not time dependent
    starting_time_s: Option<u32>,
    class_id: u8,
    path_index: Option<usize>,
}

impl DemandCell {
    /// Creates a cell that is not time dependent, with class 0.  `group` must be below
    /// `MAX_GROUPS`; the reader skips rows with any other group before building a cell.
    pub fn new(group: u8, origin_node_id: i32, destination_node_id: i32, quantity: f64)
               -> DemandCell {
        debug_assert!(group < MAX_GROUPS, "group {} out of range", group);
        DemandCell {
            group,
            origin_node_id,
            destination_node_id,
            quantity,
            relocated_origin_node_id: origin_node_id,
            relocated_starting_time_s: None,
            starting_time_s: None,
            class_id: 0,
            path_index: None,
        }
    }

    /// Makes the cell time dependent.  The starting time is expressed in seconds after
    /// midnight.
    pub fn with_starting_time(mut self, starting_time_s: u32) -> DemandCell {
        self.starting_time_s = Some(starting_time_s);
        self.relocated_starting_time_s = Some(starting_time_s);
        self
    }

    pub fn with_class(mut self, class_id: u8) -> DemandCell {
        self.class_id = class_id;
        self
    }

    pub fn group(&self) -> u8 {
        self.group
    }

    pub fn origin_node_id(&self) -> i32 {
        self.origin_node_id
    }

    pub fn destination_node_id(&self) -> i32 {
        self.destination_node_id
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn starting_time_s(&self) -> Option<u32> {
        self.starting_time_s
    }

    pub fn is_time_dependent(&self) -> bool {
        self.starting_time_s.is_some()
    }

    pub fn class_id(&self) -> u8 {
        self.class_id
    }

    pub fn relocated_origin_node_id(&self) -> i32 {
        self.relocated_origin_node_id
    }

    pub fn relocated_starting_time_s(&self) -> Option<u32> {
        self.relocated_starting_time_s
    }

    pub fn path_index(&self) -> Option<usize> {
        self.path_index
    }

    pub fn add_quantity(&mut self, quantity: f64) {
        self.quantity += quantity;
    }

    /// Moves the demand to another real node, starting at another time.
    pub fn relocate(&mut self, origin_node_id: i32, starting_time_s: u32) {
        self.relocated_origin_node_id = origin_node_id;
        self.relocated_starting_time_s = Some(starting_time_s);
    }

    pub fn set_path_index(&mut self, path_index: usize) {
        self.path_index = Some(path_index);
    }

    /// Two cells describe the same demand if everything but the quantity matches, in which
    /// case their quantities can be accumulated.
    pub fn is_same_demand(&self, other: &DemandCell) -> bool {
        self.origin_node_id == other.origin_node_id
            && self.destination_node_id == other.destination_node_id
            && self.group == other.group
            && self.class_id == other.class_id
            && self.starting_time_s == other.starting_time_s
    }
}
