use super::*;
use crate::game::types::{Food, Snake, Vector2};
use serde_json::Value;
use std::collections::VecDeque;

const TIMEOUT_MS: i64 = 300_000;

fn settings() -> WorldSettings {
    WorldSettings {
        width: 32,
        height: 32,
        player_timeout_ms: TIMEOUT_MS,
    }
}

fn make_state() -> ServerState {
    ServerState::with_seed(settings(), 42)
}

fn connection() -> ConnectionHandle {
    ConnectionHandle::channel().0
}

fn make_snake(cells: &[(i32, i32)], body_len: usize, direction: Direction) -> Snake {
    Snake {
        body: cells.iter().map(|(x, y)| Vector2::new(*x, *y)).collect(),
        body_len,
        direction,
        color: "#ffffff".to_string(),
        dead: false,
    }
}

fn set_snake(state: &mut ServerState, id: PlayerId, snake: Snake) {
    state.players.get_mut(&id).unwrap().snake = Some(snake);
}

fn set_foods(state: &mut ServerState, room_id: &str, cells: &[(i32, i32)]) {
    state.rooms.get_mut(room_id).unwrap().foods = cells
        .iter()
        .map(|(x, y)| Food {
            position: Vector2::new(*x, *y),
        })
        .collect();
}

/// Connects a player and puts it in a fresh room; returns (player, room).
fn player_in_new_room(state: &mut ServerState, name: &str) -> (PlayerId, RoomId) {
    let player = state.connect(name, connection(), 0);
    let room = state.create_room(player.id).unwrap().unwrap();
    (player.id, room.id)
}

fn join(state: &mut ServerState, name: &str, room_id: &str) -> PlayerId {
    let player = state.connect(name, connection(), 0);
    state.join_room(player.id, room_id).unwrap();
    player.id
}

fn assert_rooms_consistent(state: &ServerState) {
    for room in state.rooms.values() {
        for id in &room.players {
            let player = state.players.get(id).expect("room member is registered");
            assert_eq!(player.room.as_deref(), Some(room.id.as_str()));
        }
    }
    for player in state.players.values() {
        if let Some(room_id) = &player.room {
            let room = state.rooms.get(room_id).expect("back-reference points at a live room");
            assert!(room.players.contains(&player.id));
        }
    }
}

fn sent_json(outbound: &[Outbound]) -> Vec<(Uuid, Value)> {
    outbound
        .iter()
        .filter_map(|item| match item {
            Outbound::Send {
                connection,
                payload,
            } => Some((connection.id(), serde_json::from_str::<Value>(payload).unwrap())),
            Outbound::Close(_) => None,
        })
        .collect()
}

#[test]
fn connect_mints_monotonic_ids_and_secrets() {
    let mut state = make_state();
    let first = state.connect("alice", connection(), 0);
    let second = state.connect("bob", connection(), 0);
    assert_eq!(first.id, 0);
    assert_eq!(second.id, 1);
    assert_eq!(first.name, "alice");
    assert_eq!(first.unique_id.len(), TOKEN_LENGTH);
    assert!(state.player(first.id).unwrap().connection.is_some());
    assert!(state.player(first.id).unwrap().room.is_none());
}

#[test]
fn connect_sanitizes_names() {
    let mut state = make_state();
    let player = state.connect("   ", connection(), 0);
    assert_eq!(player.name, "Player");
}

#[test]
fn reconnect_requires_exact_secret() {
    let mut state = make_state();
    let player = state.connect("alice", connection(), 0);
    let wrong = format!("{}X", player.unique_id);
    assert_eq!(
        state.reconnect(player.id, &wrong, connection(), 1).unwrap_err(),
        SessionError::ReconnectFailed
    );
    assert_eq!(
        state.reconnect(player.id + 1, &player.unique_id, connection(), 1).unwrap_err(),
        SessionError::ReconnectFailed
    );
}

#[test]
fn reconnect_evicts_previous_connection() {
    let mut state = make_state();
    let old = connection();
    let player = state.connect("alice", old.clone(), 0);
    let new = connection();

    let (public, evicted) = state.reconnect(player.id, &player.unique_id, new.clone(), 5).unwrap();

    assert_eq!(public, player);
    assert!(evicted.unwrap().same_as(&old));
    assert!(state.is_bound(player.id, new.id()));
    assert!(!state.is_bound(player.id, old.id()));
}

#[test]
fn reconnect_twice_is_idempotent() {
    let mut state = make_state();
    let original = connection();
    let player = state.connect("alice", original.clone(), 0);
    assert!(state.mark_disconnected(player.id, original.id(), 1));
    let socket = connection();

    let (first, first_evicted) = state
        .reconnect(player.id, &player.unique_id, socket.clone(), 2)
        .unwrap();
    let (second, second_evicted) = state
        .reconnect(player.id, &player.unique_id, socket.clone(), 3)
        .unwrap();

    assert_eq!(first, second);
    assert!(first_evicted.is_none());
    assert!(second_evicted.is_none());
    assert!(state.is_bound(player.id, socket.id()));
    assert!(!state.is_bound(player.id, original.id()));
}

#[test]
fn reconnect_resumes_room_and_snake() {
    let mut state = make_state();
    let (player_id, room_id) = player_in_new_room(&mut state, "alice");
    let socket_id = state.player(player_id).unwrap().connection.as_ref().unwrap().id();
    state.mark_disconnected(player_id, socket_id, 10);
    let before = state.player(player_id).unwrap().snake.clone();
    let secret = state.player(player_id).unwrap().unique_id.clone();

    state.reconnect(player_id, &secret, connection(), 20).unwrap();

    let player = state.player(player_id).unwrap();
    assert_eq!(player.room.as_deref(), Some(room_id.as_str()));
    assert_eq!(player.snake, before);
    assert_rooms_consistent(&state);
}

#[test]
fn mark_disconnected_keeps_room_membership() {
    let mut state = make_state();
    let (player_id, room_id) = player_in_new_room(&mut state, "alice");
    let socket_id = state.player(player_id).unwrap().connection.as_ref().unwrap().id();

    assert!(state.mark_disconnected(player_id, socket_id, 99));

    let player = state.player(player_id).unwrap();
    assert!(player.connection.is_none());
    assert_eq!(player.last_active, 99);
    assert!(state.rooms[&room_id].players.contains(&player_id));
    assert_rooms_consistent(&state);
}

#[test]
fn stale_connection_cannot_detach_new_one() {
    let mut state = make_state();
    let old = connection();
    let player = state.connect("alice", old.clone(), 0);
    let new = connection();
    state.reconnect(player.id, &player.unique_id, new.clone(), 1).unwrap();

    assert!(!state.mark_disconnected(player.id, old.id(), 2));
    assert!(state.is_bound(player.id, new.id()));
}

#[test]
fn create_room_places_single_player() {
    let mut state = make_state();
    let player = state.connect("alice", connection(), 0);

    let room = state.create_room(player.id).unwrap().unwrap();

    assert_eq!(room.id.len(), TOKEN_LENGTH);
    assert_eq!(room.players.len(), 1);
    assert_eq!(room.players[0].id, player.id);
    let snake = room.players[0].snake.as_ref().unwrap();
    assert_eq!(snake.body.len(), 1);
    assert_eq!(snake.body_len, 1);
    assert_rooms_consistent(&state);
}

#[test]
fn create_room_twice_is_a_no_op() {
    let mut state = make_state();
    let (player_id, _) = player_in_new_room(&mut state, "alice");
    assert!(state.create_room(player_id).unwrap().is_none());
    assert_eq!(state.rooms.len(), 1);
}

#[test]
fn second_player_joins_at_distinct_cell() {
    let mut state = make_state();
    let (owner, room_id) = player_in_new_room(&mut state, "alice");
    let guest = state.connect("bob", connection(), 0);

    let snake = state.join_room(guest.id, &room_id).unwrap();

    let owner_head = state.player(owner).unwrap().snake.as_ref().unwrap().head();
    assert_ne!(snake.head(), owner_head);
    assert_eq!(state.rooms[&room_id].players.len(), 2);
    assert_eq!(state.player(guest.id).unwrap().snake.as_ref(), Some(&snake));
    assert_rooms_consistent(&state);
}

#[test]
fn join_matches_room_ids_case_insensitively() {
    let mut state = make_state();
    let (_, room_id) = player_in_new_room(&mut state, "alice");
    let guest = state.connect("bob", connection(), 0);
    let lowered = format!("  {}  ", room_id.to_ascii_lowercase());
    assert!(state.join_room(guest.id, &lowered).is_ok());
    assert_rooms_consistent(&state);
}

#[test]
fn join_rejects_unknown_room_and_second_room() {
    let mut state = make_state();
    let (owner, room_id) = player_in_new_room(&mut state, "alice");
    let (_, other_room) = player_in_new_room(&mut state, "carol");

    assert_eq!(state.join_room(owner, "NOPE0").unwrap_err(), SessionError::RoomNotFound);
    assert_eq!(state.join_room(owner, &other_room).unwrap_err(), SessionError::AlreadyInRoom);
    assert_eq!(
        state.player(owner).unwrap().room.as_deref(),
        Some(room_id.as_str())
    );
    assert_rooms_consistent(&state);
}

#[test]
fn leave_room_clears_membership_and_snake() {
    let mut state = make_state();
    let (owner, room_id) = player_in_new_room(&mut state, "alice");
    let guest = join(&mut state, "bob", &room_id);

    assert!(state.leave_room(guest));
    assert!(!state.leave_room(guest));

    let player = state.player(guest).unwrap();
    assert!(player.room.is_none());
    assert!(player.snake.is_none());
    assert_eq!(state.rooms[&room_id].players.len(), 1);
    assert!(state.rooms[&room_id].players.contains(&owner));
    assert_rooms_consistent(&state);
}

#[test]
fn prune_removes_only_empty_rooms() {
    let mut state = make_state();
    let (owner, room_id) = player_in_new_room(&mut state, "alice");
    let (_, kept) = player_in_new_room(&mut state, "bob");
    state.leave_room(owner);

    assert_eq!(state.prune_empty_rooms(), vec![room_id.clone()]);
    assert!(!state.rooms.contains_key(&room_id));
    assert!(state.rooms.contains_key(&kept));
}

#[test]
fn steer_follows_no_reversal_law() {
    let mut state = make_state();
    let (player_id, _) = player_in_new_room(&mut state, "alice");
    set_snake(
        &mut state,
        player_id,
        make_snake(&[(5, 5), (4, 5)], 2, Direction::East),
    );

    assert!(!state.steer(player_id, Direction::West));
    assert!(state.steer(player_id, Direction::South));
    assert_eq!(
        state.player(player_id).unwrap().snake.as_ref().unwrap().direction,
        Direction::South
    );

    let lobby = state.connect("bob", connection(), 0);
    assert!(!state.steer(lobby.id, Direction::North));
}

#[test]
fn tick_moves_single_cell_snake() {
    let mut state = make_state();
    let (player_id, room_id) = player_in_new_room(&mut state, "alice");
    set_snake(&mut state, player_id, make_snake(&[(5, 5)], 1, Direction::East));
    set_foods(&mut state, &room_id, &[(20, 20)]);

    state.tick();

    let snake = state.player(player_id).unwrap().snake.clone().unwrap();
    assert_eq!(snake.body, VecDeque::from(vec![Vector2::new(6, 5)]));
    assert_eq!(snake.body_len, 1);
}

#[test]
fn input_applies_on_next_tick_only() {
    let mut state = make_state();
    let (player_id, room_id) = player_in_new_room(&mut state, "alice");
    set_snake(&mut state, player_id, make_snake(&[(5, 5)], 1, Direction::East));
    set_foods(&mut state, &room_id, &[(20, 20)]);

    state.steer(player_id, Direction::South);
    let head = state.player(player_id).unwrap().snake.as_ref().unwrap().head();
    assert_eq!(head, Some(Vector2::new(5, 5)));

    state.tick();
    let head = state.player(player_id).unwrap().snake.as_ref().unwrap().head();
    assert_eq!(head, Some(Vector2::new(5, 6)));
}

#[test]
fn eating_food_grows_over_following_ticks() {
    let mut state = make_state();
    let (player_id, room_id) = player_in_new_room(&mut state, "alice");
    set_snake(&mut state, player_id, make_snake(&[(5, 5)], 1, Direction::East));
    set_foods(&mut state, &room_id, &[(6, 5)]);

    state.tick();

    let snake = state.player(player_id).unwrap().snake.clone().unwrap();
    assert_eq!(snake.body_len, 2);
    assert_eq!(snake.body.len(), 1);
    let foods = &state.rooms[&room_id].foods;
    assert_eq!(foods.len(), 1);
    assert_ne!(foods[0].position, Vector2::new(6, 5));

    set_foods(&mut state, &room_id, &[(20, 20)]);
    state.tick();
    let snake = state.player(player_id).unwrap().snake.clone().unwrap();
    assert_eq!(snake.body.len(), 2);
    assert_eq!(
        snake.body,
        VecDeque::from(vec![Vector2::new(7, 5), Vector2::new(6, 5)])
    );

    state.tick();
    let snake = state.player(player_id).unwrap().snake.clone().unwrap();
    assert_eq!(snake.body.len(), 2);
}

#[test]
fn head_on_collision_kills_both_snakes() {
    let mut state = make_state();
    let (left, room_id) = player_in_new_room(&mut state, "alice");
    let right = join(&mut state, "bob", &room_id);
    set_snake(&mut state, left, make_snake(&[(5, 5)], 1, Direction::East));
    set_snake(&mut state, right, make_snake(&[(7, 5)], 1, Direction::West));
    set_foods(&mut state, &room_id, &[(20, 20), (21, 21)]);

    let outbound = state.tick();

    for id in [left, right] {
        let player = state.player(id).unwrap();
        assert!(player.snake.is_none());
        assert!(player.room.is_none());
    }
    assert!(!state.rooms.contains_key(&room_id));
    let deaths: Vec<u64> = sent_json(&outbound)
        .into_iter()
        .filter(|(_, value)| value["type"] == "broadcast_snake_ded")
        .map(|(_, value)| value["data"]["id"].as_u64().unwrap())
        .collect();
    assert_eq!(deaths, vec![left, right]);
    assert_rooms_consistent(&state);
}

#[test]
fn running_into_a_body_kills_only_the_mover() {
    let mut state = make_state();
    let (mover, room_id) = player_in_new_room(&mut state, "alice");
    let wall = join(&mut state, "bob", &room_id);
    set_snake(&mut state, mover, make_snake(&[(5, 5)], 1, Direction::East));
    set_snake(
        &mut state,
        wall,
        make_snake(&[(6, 4), (6, 5), (6, 6)], 3, Direction::North),
    );
    set_foods(&mut state, &room_id, &[(20, 20), (21, 21)]);

    state.tick();

    assert!(state.player(mover).unwrap().snake.is_none());
    let survivor = state.player(wall).unwrap().snake.clone().unwrap();
    assert!(!survivor.dead);
    assert_eq!(survivor.head(), Some(Vector2::new(6, 3)));
    assert_eq!(state.rooms[&room_id].players.len(), 1);
    assert_rooms_consistent(&state);
}

#[test]
fn self_collided_snake_is_not_a_target() {
    let mut state = make_state();
    let (looped, room_id) = player_in_new_room(&mut state, "alice");
    let other = join(&mut state, "bob", &room_id);
    set_snake(
        &mut state,
        looped,
        make_snake(&[(5, 5), (5, 6), (4, 6), (4, 5), (4, 4)], 5, Direction::South),
    );
    set_snake(&mut state, other, make_snake(&[(3, 5)], 1, Direction::East));
    set_foods(&mut state, &room_id, &[(20, 20), (21, 21)]);

    state.tick();

    assert!(state.player(looped).unwrap().snake.is_none());
    let survivor = state.player(other).unwrap().snake.clone().unwrap();
    assert_eq!(survivor.head(), Some(Vector2::new(4, 5)));
    assert!(!survivor.dead);
}

#[test]
fn tick_keeps_food_at_least_player_count() {
    let mut state = make_state();
    let (_, room_id) = player_in_new_room(&mut state, "alice");
    join(&mut state, "bob", &room_id);
    join(&mut state, "carol", &room_id);
    set_foods(&mut state, &room_id, &[]);

    state.tick();

    if let Some(room) = state.rooms.get(&room_id) {
        assert!(room.foods.len() >= room.players.len());
    }
}

#[test]
fn body_stays_within_bound_across_ticks() {
    let mut state = make_state();
    let (player_id, _) = player_in_new_room(&mut state, "alice");
    let mut last_len = 0;
    for step in 0..500 {
        let direction = Direction::ALL[(step / 7) % 4];
        state.steer(player_id, direction);
        state.tick();
        let Some(snake) = state.player(player_id).and_then(|player| player.snake.clone()) else {
            break;
        };
        assert!(snake.body.len() <= snake.body_len);
        assert!(snake.body_len >= last_len);
        last_len = snake.body_len;
        assert_rooms_consistent(&state);
    }
}

#[test]
fn broadcast_goes_to_connected_members_only() {
    let mut state = make_state();
    let (owner, room_id) = player_in_new_room(&mut state, "alice");
    let guest = join(&mut state, "bob", &room_id);
    set_snake(&mut state, owner, make_snake(&[(1, 1)], 1, Direction::East));
    set_snake(&mut state, guest, make_snake(&[(1, 10)], 1, Direction::East));
    set_foods(&mut state, &room_id, &[(20, 20), (21, 21)]);
    let guest_socket = state.player(guest).unwrap().connection.as_ref().unwrap().id();
    state.mark_disconnected(guest, guest_socket, 1);
    let owner_socket = state.player(owner).unwrap().connection.as_ref().unwrap().id();

    let sent = sent_json(&state.tick());

    assert_eq!(sent.len(), 1);
    let (recipient, value) = &sent[0];
    assert_eq!(*recipient, owner_socket);
    assert_eq!(value["type"], "broadcast_room");
    assert_eq!(value["data"]["snakes"].as_array().unwrap().len(), 2);
    assert_eq!(value["data"]["foods"].as_array().unwrap().len(), 2);
    assert!(value["data"]["snakes"][0].get("connection").is_none());
}

#[test]
fn idle_player_is_reaped_after_grace_period() {
    let mut state = make_state();
    let (player_id, room_id) = player_in_new_room(&mut state, "alice");
    let socket_id = state.player(player_id).unwrap().connection.as_ref().unwrap().id();
    state.mark_disconnected(player_id, socket_id, 1_000);

    assert!(state.reap_idle(1_000 + TIMEOUT_MS).is_empty());
    assert!(state.rooms[&room_id].players.contains(&player_id));

    assert_eq!(state.reap_idle(1_000 + TIMEOUT_MS + 1), vec![player_id]);
    assert!(state.player(player_id).unwrap().room.is_none());
    assert_rooms_consistent(&state);

    state.tick();
    assert!(!state.rooms.contains_key(&room_id));

    let secret = state.player(player_id).unwrap().unique_id.clone();
    assert!(state.reconnect(player_id, &secret, connection(), 2_000_000).is_ok());
    assert!(state.player(player_id).unwrap().room.is_none());
}

#[test]
fn reaper_ignores_connected_players() {
    let mut state = make_state();
    let (player_id, room_id) = player_in_new_room(&mut state, "alice");
    assert!(state.reap_idle(i64::MAX).is_empty());
    assert!(state.rooms[&room_id].players.contains(&player_id));
}
